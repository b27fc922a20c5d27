//! Host-native codepage resolution
//!
//! Office hosts read and write module files in the system ANSI codepage of
//! the locale the document was created with. On-disk canonical files are
//! always UTF-8; the native codepage is only used for the transient files
//! exchanged with the host import/export calls.
//!
//! Resolution order: explicit user codepage, then the codepage derived from
//! the document's language id, then Western European (cp1252).

use std::fs;
use std::path::Path;

use anyhow::Context;
use encoding_rs::{
    BIG5, EUC_KR, Encoding, GBK, SHIFT_JIS, WINDOWS_874, WINDOWS_1250, WINDOWS_1251,
    WINDOWS_1252, WINDOWS_1253, WINDOWS_1254, WINDOWS_1255, WINDOWS_1256, WINDOWS_1257,
    WINDOWS_1258,
};

use crate::error::Result;

/// Fallback codepage when nothing better is known
pub const DEFAULT_CODEPAGE: &str = "cp1252";

/// Windows locale id to default ANSI codepage
const LCID_TO_CODEPAGE: &[(u32, &str)] = &[
    // Western European
    (1033, "cp1252"), // en-US
    (2057, "cp1252"), // en-GB
    (3081, "cp1252"), // en-AU
    (4105, "cp1252"), // en-CA
    (1031, "cp1252"), // de-DE
    (2055, "cp1252"), // de-CH
    (3079, "cp1252"), // de-AT
    (1036, "cp1252"), // fr-FR
    (2060, "cp1252"), // fr-BE
    (3084, "cp1252"), // fr-CA
    (4108, "cp1252"), // fr-CH
    (1040, "cp1252"), // it-IT
    (1034, "cp1252"), // es-ES
    (2058, "cp1252"), // es-MX
    (1043, "cp1252"), // nl-NL
    (2067, "cp1252"), // nl-BE
    (1046, "cp1252"), // pt-BR
    (2070, "cp1252"), // pt-PT
    (1053, "cp1252"), // sv-SE
    (1030, "cp1252"), // da-DK
    (1044, "cp1252"), // nb-NO
    (2068, "cp1252"), // nn-NO
    (1035, "cp1252"), // fi-FI
    (1039, "cp1252"), // is-IS
    (1027, "cp1252"), // ca-ES
    (1069, "cp1252"), // eu-ES
    (1110, "cp1252"), // gl-ES
    // Central European
    (1045, "cp1250"), // pl-PL
    (1029, "cp1250"), // cs-CZ
    (1038, "cp1250"), // hu-HU
    (1051, "cp1250"), // sk-SK
    (1060, "cp1250"), // sl-SI
    (1050, "cp1250"), // hr-HR
    (2074, "cp1250"), // sr-Latn-CS
    (1048, "cp1250"), // ro-RO
    (1052, "cp1250"), // sq-AL
    // Cyrillic
    (1049, "cp1251"), // ru-RU
    (1058, "cp1251"), // uk-UA
    (1059, "cp1251"), // be-BY
    (1026, "cp1251"), // bg-BG
    (3098, "cp1251"), // sr-Cyrl-CS
    (1071, "cp1251"), // mk-MK
    (1087, "cp1251"), // kk-KZ
    (2092, "cp1251"), // az-Cyrl-AZ
    (2115, "cp1251"), // uz-Cyrl-UZ
    (1064, "cp1251"), // tg-Cyrl-TJ
    (1088, "cp1251"), // ky-KG
    (1092, "cp1251"), // tt-RU
    (1104, "cp1251"), // mn-MN
    // Greek
    (1032, "cp1253"), // el-GR
    // Turkish
    (1055, "cp1254"), // tr-TR
    (1068, "cp1254"), // az-Latn-AZ
    // Hebrew
    (1037, "cp1255"), // he-IL
    // Arabic
    (1025, "cp1256"),  // ar-SA
    (5121, "cp1256"),  // ar-DZ
    (15361, "cp1256"), // ar-BH
    (3073, "cp1256"),  // ar-EG
    (2049, "cp1256"),  // ar-IQ
    (11265, "cp1256"), // ar-JO
    (13313, "cp1256"), // ar-KW
    (12289, "cp1256"), // ar-LB
    (4097, "cp1256"),  // ar-LY
    (6145, "cp1256"),  // ar-MA
    (8193, "cp1256"),  // ar-OM
    (16385, "cp1256"), // ar-QA
    (10241, "cp1256"), // ar-SY
    (7169, "cp1256"),  // ar-TN
    (14337, "cp1256"), // ar-AE
    (9217, "cp1256"),  // ar-YE
    (1065, "cp1256"),  // fa-IR
    (1056, "cp1256"),  // ur-PK
    // Baltic
    (1063, "cp1257"), // lt-LT
    (1062, "cp1257"), // lv-LV
    (1061, "cp1257"), // et-EE
    // Vietnamese
    (1066, "cp1258"), // vi-VN
    // Thai
    (1054, "cp874"), // th-TH
    // CJK
    (1041, "cp932"), // ja-JP
    (2052, "cp936"), // zh-CN
    (4100, "cp936"), // zh-SG
    (1042, "cp949"), // ko-KR
    (1028, "cp950"), // zh-TW
    (3076, "cp950"), // zh-HK
    (5124, "cp950"), // zh-MO
];

/// Default codepage name for a Windows locale id
#[must_use]
pub fn codepage_for_lcid(lcid: u32) -> Option<&'static str> {
    LCID_TO_CODEPAGE
        .iter()
        .find(|(id, _)| *id == lcid)
        .map(|(_, codepage)| *codepage)
}

/// Look up the encoding for a codepage name
///
/// Accepts `cpNNNN`, `windows-NNNN` and any WHATWG encoding label.
#[must_use]
pub fn encoding_for_codepage(name: &str) -> Option<&'static Encoding> {
    let lowered = name.trim().to_ascii_lowercase();
    let number = lowered
        .strip_prefix("cp")
        .or_else(|| lowered.strip_prefix("windows-"))
        .and_then(|n| n.parse::<u32>().ok());

    let by_number = number.and_then(|n| match n {
        874 => Some(WINDOWS_874),
        932 => Some(SHIFT_JIS),
        936 => Some(GBK),
        949 => Some(EUC_KR),
        950 => Some(BIG5),
        1250 => Some(WINDOWS_1250),
        1251 => Some(WINDOWS_1251),
        1252 => Some(WINDOWS_1252),
        1253 => Some(WINDOWS_1253),
        1254 => Some(WINDOWS_1254),
        1255 => Some(WINDOWS_1255),
        1256 => Some(WINDOWS_1256),
        1257 => Some(WINDOWS_1257),
        1258 => Some(WINDOWS_1258),
        _ => None,
    });

    by_number.or_else(|| Encoding::for_label(lowered.as_bytes()))
}

/// A resolved host-native codepage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Codepage {
    name: &'static str,
    encoding: &'static Encoding,
}

impl Codepage {
    /// The fallback Western European codepage
    #[must_use]
    pub fn fallback() -> Self {
        Self {
            name: WINDOWS_1252.name(),
            encoding: WINDOWS_1252,
        }
    }

    /// Resolve by explicit name
    ///
    /// # Errors
    ///
    /// Returns an error if the name is not a known codepage.
    pub fn from_name(name: &str) -> Result<Self> {
        let encoding = encoding_for_codepage(name)
            .with_context(|| format!("Unknown codepage: {name}"))?;
        Ok(Self {
            name: encoding.name(),
            encoding,
        })
    }

    /// Resolve following user choice, then document language, then fallback
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit codepage name is unknown.
    pub fn resolve(user_codepage: Option<&str>, language_id: Option<u32>) -> Result<Self> {
        if let Some(name) = user_codepage {
            tracing::debug!(codepage = name, "Using user-specified codepage");
            return Self::from_name(name);
        }

        if let Some(lcid) = language_id {
            if let Some(name) = codepage_for_lcid(lcid) {
                tracing::debug!(lcid, codepage = name, "Codepage from document language");
                return Self::from_name(name);
            }
            tracing::debug!(lcid, "No codepage mapping for document language");
        }

        Ok(Self::fallback())
    }

    /// Encoding name (WHATWG form, e.g. `windows-1251`)
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Underlying encoding
    #[must_use]
    pub const fn encoding(&self) -> &'static Encoding {
        self.encoding
    }

    /// Whether every character of `text` exists in this codepage
    #[must_use]
    pub fn can_encode(&self, text: &str) -> bool {
        let (_, _, had_unmappable) = self.encoding.encode(text);
        !had_unmappable
    }

    /// Encode text into codepage bytes
    ///
    /// # Errors
    ///
    /// Returns an error if the text contains characters the codepage cannot
    /// represent.
    pub fn encode(&self, text: &str) -> Result<Vec<u8>> {
        let (bytes, _, had_unmappable) = self.encoding.encode(text);
        if had_unmappable {
            anyhow::bail!("Text contains characters not representable in {}", self.name);
        }
        Ok(bytes.into_owned())
    }

    /// Decode codepage bytes into text, replacing malformed sequences
    #[must_use]
    pub fn decode(&self, bytes: &[u8]) -> String {
        let (text, _) = self.encoding.decode_without_bom_handling(bytes);
        text.into_owned()
    }
}

/// Read a local module file as UTF-8
///
/// Files that are not valid UTF-8 are assumed to be legacy cp1252 exports:
/// they are decoded as such and rewritten as UTF-8 in place.
///
/// # Errors
///
/// Returns an error if the file cannot be read or rewritten.
pub fn read_utf8_with_fallback(path: &Path) -> Result<String> {
    let bytes =
        fs::read(path).with_context(|| format!("Failed to read file: {}", path.display()))?;

    match String::from_utf8(bytes) {
        Ok(text) => Ok(text),
        Err(err) => {
            tracing::debug!(path = %path.display(), "Not UTF-8, converting from cp1252");
            let text = Codepage::fallback().decode(err.as_bytes());
            fs::write(path, &text)
                .with_context(|| format!("Failed to rewrite as UTF-8: {}", path.display()))?;
            Ok(text)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_lcid_lookup() {
        assert_eq!(codepage_for_lcid(1033), Some("cp1252"));
        assert_eq!(codepage_for_lcid(1049), Some("cp1251"));
        assert_eq!(codepage_for_lcid(1041), Some("cp932"));
        assert_eq!(codepage_for_lcid(9999), None);
    }

    #[test]
    fn test_every_table_entry_resolves() {
        for (lcid, name) in LCID_TO_CODEPAGE {
            assert!(encoding_for_codepage(name).is_some(), "{lcid} -> {name}");
        }
    }

    #[test]
    fn test_encoding_name_forms() {
        assert_eq!(encoding_for_codepage("cp1251"), Some(WINDOWS_1251));
        assert_eq!(encoding_for_codepage("Windows-1250"), Some(WINDOWS_1250));
        assert_eq!(encoding_for_codepage("cp932"), Some(SHIFT_JIS));
        assert_eq!(encoding_for_codepage("utf-8"), Some(encoding_rs::UTF_8));
        assert_eq!(encoding_for_codepage("cp99999"), None);
        assert_eq!(encoding_for_codepage("nonsense"), None);
    }

    #[test]
    fn test_resolve_priority() {
        let user = Codepage::resolve(Some("cp1250"), Some(1049)).unwrap();
        assert_eq!(user.encoding(), WINDOWS_1250);

        let from_language = Codepage::resolve(None, Some(1049)).unwrap();
        assert_eq!(from_language.encoding(), WINDOWS_1251);

        let unknown_language = Codepage::resolve(None, Some(9999)).unwrap();
        assert_eq!(unknown_language, Codepage::fallback());

        let nothing = Codepage::resolve(None, None).unwrap();
        assert_eq!(nothing.name(), "windows-1252");
        assert_eq!(Codepage::from_name(DEFAULT_CODEPAGE).unwrap(), nothing);
    }

    #[test]
    fn test_resolve_unknown_user_codepage_fails() {
        assert!(Codepage::resolve(Some("cp0"), None).is_err());
    }

    #[test]
    fn test_encode_decode_cyrillic() {
        let codepage = Codepage::from_name("cp1251").unwrap();
        let bytes = codepage.encode("Привет").unwrap();
        assert_eq!(bytes.len(), 6);
        assert_eq!(codepage.decode(&bytes), "Привет");
    }

    #[test]
    fn test_encode_unmappable_fails() {
        let codepage = Codepage::fallback();
        assert!(!codepage.can_encode("Привет"));
        assert!(codepage.encode("Привет").is_err());
        assert!(codepage.can_encode("Grüße"));
    }

    #[test]
    fn test_read_utf8_fallback_rewrites_file() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("Legacy.bas");
        // "Grüße" in cp1252
        fs::write(&path, [0x47, 0x72, 0xFC, 0xDF, 0x65]).unwrap();

        let text = read_utf8_with_fallback(&path).unwrap();
        assert_eq!(text, "Grüße");
        assert_eq!(fs::read_to_string(&path).unwrap(), "Grüße");
    }
}
