/// Language codes the reader recognizes.
pub const LANGUAGE_CODES: &[&str] = &[
    "ar", "be", "bg", "ca", "cs", "da", "de", "el", "en", "eo", "es", "et", "eu", "fa", "fi",
    "fr", "ga", "he", "hi", "hr", "hu", "hy", "id", "is", "it", "ja", "ka", "kk", "ko", "la",
    "lt", "lv", "mk", "nl", "no", "pl", "pt", "ro", "ru", "sk", "sl", "sr", "sv", "th", "tr",
    "uk", "vi", "zh",
];

pub fn is_known_language(code: &str) -> bool {
    LANGUAGE_CODES.contains(&code)
}
