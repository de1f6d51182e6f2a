//! Localised user-facing strings.
//!
//! There is no global language setting: a [`Localizer`] is an explicit value
//! handed to whatever needs to produce text (error messages, CLI output).
//! Changing the language goes through [`Localizer::set_locale`], which
//! notifies every [`Localizer::subscribe`]r.
//!
//! Lookup order is: the current locale's table, then English, then a
//! fallback derived from the key itself (`"maxFileSize"` → `"Max file size"`),
//! so the library keeps working even for keys no table knows about.

use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use tokio::sync::watch;
use tracing::debug;

/// Supported interface languages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Locale {
    #[default]
    #[serde(rename = "en")]
    En,
    #[serde(rename = "zh-Hans")]
    ZhHans,
    #[serde(rename = "zh-Hant")]
    ZhHant,
    #[serde(rename = "de")]
    De,
    #[serde(rename = "fr")]
    Fr,
    #[serde(rename = "ar")]
    Ar,
    #[serde(rename = "fa")]
    Fa,
    #[serde(rename = "hi")]
    Hi,
    #[serde(rename = "th")]
    Th,
}

impl Locale {
    /// Every supported locale, in menu order.
    pub const ALL: [Locale; 9] = [
        Locale::En,
        Locale::ZhHans,
        Locale::ZhHant,
        Locale::De,
        Locale::Fr,
        Locale::Ar,
        Locale::Fa,
        Locale::Hi,
        Locale::Th,
    ];

    /// BCP 47 tag.
    pub fn code(self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::ZhHans => "zh-Hans",
            Locale::ZhHant => "zh-Hant",
            Locale::De => "de",
            Locale::Fr => "fr",
            Locale::Ar => "ar",
            Locale::Fa => "fa",
            Locale::Hi => "hi",
            Locale::Th => "th",
        }
    }

    /// Name of the language in that language.
    pub fn native_name(self) -> &'static str {
        match self {
            Locale::En => "English",
            Locale::ZhHans => "简体中文",
            Locale::ZhHant => "繁體中文",
            Locale::De => "Deutsch",
            Locale::Fr => "Français",
            Locale::Ar => "العربية",
            Locale::Fa => "فارسی",
            Locale::Hi => "हिन्दी",
            Locale::Th => "ไทย",
        }
    }

    /// Right-to-left script.
    pub fn is_rtl(self) -> bool {
        matches!(self, Locale::Ar | Locale::Fa)
    }

    fn table(self) -> &'static [(&'static str, &'static str)] {
        match self {
            Locale::En => EN,
            Locale::ZhHans => ZH_HANS,
            Locale::ZhHant => ZH_HANT,
            Locale::De => DE,
            Locale::Fr => FR,
            Locale::Ar | Locale::Fa | Locale::Hi | Locale::Th => &[],
        }
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Locale {
    type Err = String;

    /// Accepts exact tags case-insensitively plus common aliases
    /// (`zh`, `zh-CN`, `zh-TW`, `en-US`, ...).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase().replace('_', "-");
        let locale = match lower.as_str() {
            "zh-hans" | "zh" | "zh-cn" | "zh-sg" => Locale::ZhHans,
            "zh-hant" | "zh-tw" | "zh-hk" => Locale::ZhHant,
            other => {
                let primary = other.split('-').next().unwrap_or_default();
                match primary {
                    "en" => Locale::En,
                    "de" => Locale::De,
                    "fr" => Locale::Fr,
                    "ar" => Locale::Ar,
                    "fa" => Locale::Fa,
                    "hi" => Locale::Hi,
                    "th" => Locale::Th,
                    _ => return Err(format!("unsupported locale '{s}'")),
                }
            }
        };
        Ok(locale)
    }
}

/// Explicit localisation context.
pub struct Localizer {
    current: watch::Sender<Locale>,
}

impl Localizer {
    pub fn new(locale: Locale) -> Self {
        let (current, _rx) = watch::channel(locale);
        Self { current }
    }

    pub fn locale(&self) -> Locale {
        *self.current.borrow()
    }

    /// Switch language and notify subscribers. Returns `true` if it changed.
    pub fn set_locale(&self, locale: Locale) -> bool {
        let changed = self.current.send_if_modified(|cur| {
            if *cur == locale {
                false
            } else {
                *cur = locale;
                true
            }
        });
        if changed {
            debug!("Locale changed to {}", locale);
        }
        changed
    }

    /// Receive a notification on every language change.
    pub fn subscribe(&self) -> watch::Receiver<Locale> {
        self.current.subscribe()
    }

    /// Look up `key`.
    pub fn t(&self, key: &str) -> Cow<'static, str> {
        lookup(self.locale(), key)
    }
}

impl Default for Localizer {
    fn default() -> Self {
        Self::new(Locale::default())
    }
}

impl fmt::Debug for Localizer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Localizer")
            .field("locale", &self.locale())
            .finish()
    }
}

fn lookup(locale: Locale, key: &str) -> Cow<'static, str> {
    let find = |table: &'static [(&'static str, &'static str)]| {
        table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
    };
    match find(locale.table()).or_else(|| find(EN)) {
        Some(text) => Cow::Borrowed(text),
        None => Cow::Owned(humanize_key(key)),
    }
}

/// `"downloadWord"` → `"Download word"`, `"file_too_large"` → `"File too large"`.
pub fn humanize_key(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in key.chars() {
        if ch == '_' || ch == '-' || ch == '.' || ch.is_whitespace() {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.extend(ch.to_lowercase());
        } else {
            current.extend(ch.to_lowercase());
        }
    }
    if !current.is_empty() {
        words.push(current);
    }

    let joined = words.join(" ");
    let mut chars = joined.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

// ── String tables ────────────────────────────────────────────────────────

const EN: &[(&str, &str)] = &[
    ("title", "Transform Your PDFs into Clean Markdown"),
    ("selectFile", "Select File"),
    ("convertNow", "Convert PDF Now"),
    ("converting", "Converting..."),
    ("loadingEngine", "Loading conversion engine..."),
    ("supportedFormats", "Only PDF files are supported."),
    ("maxFileSize", "Maximum file size is 10MB."),
    ("conversionFailed", "Failed to convert PDF. Please try a different file."),
    ("exportFailed", "Export failed. Your Markdown is still available."),
    ("invalidState", "That action is not available right now."),
    ("invalidConfig", "The configuration is invalid."),
    ("unexpectedError", "Something went wrong."),
    ("conversionResult", "Conversion Result"),
    ("download", "Download"),
    ("downloadMd", "Download MD"),
    ("downloadWord", "Download Word"),
    ("savedTo", "Saved to"),
    ("preview", "Preview"),
    ("markdown", "Markdown"),
    ("edit", "Edit"),
    ("saveChanges", "Save Changes"),
    ("cancel", "Cancel"),
    ("copiedToClipboard", "Markdown copied to clipboard!"),
];

const ZH_HANS: &[(&str, &str)] = &[
    ("title", "将 PDF 转换为整洁的 Markdown"),
    ("selectFile", "选择文件"),
    ("convertNow", "立即转换"),
    ("converting", "转换中..."),
    ("loadingEngine", "正在加载转换引擎..."),
    ("supportedFormats", "仅支持 PDF 文件。"),
    ("maxFileSize", "文件大小上限为 10MB。"),
    ("conversionFailed", "PDF 转换失败，请尝试其他文件。"),
    ("exportFailed", "导出失败，Markdown 内容仍然可用。"),
    ("conversionResult", "转换结果"),
    ("download", "下载"),
    ("downloadMd", "下载 MD"),
    ("downloadWord", "下载 Word"),
    ("savedTo", "已保存到"),
    ("preview", "预览"),
    ("markdown", "Markdown"),
    ("edit", "编辑"),
    ("saveChanges", "保存更改"),
    ("cancel", "取消"),
    ("copiedToClipboard", "Markdown 已复制到剪贴板！"),
];

const ZH_HANT: &[(&str, &str)] = &[
    ("title", "將 PDF 轉換為整潔的 Markdown"),
    ("selectFile", "選擇檔案"),
    ("convertNow", "立即轉換"),
    ("converting", "轉換中..."),
    ("supportedFormats", "僅支援 PDF 檔案。"),
    ("maxFileSize", "檔案大小上限為 10MB。"),
    ("conversionFailed", "PDF 轉換失敗，請嘗試其他檔案。"),
    ("exportFailed", "匯出失敗，Markdown 內容仍然可用。"),
    ("download", "下載"),
    ("downloadMd", "下載 MD"),
    ("downloadWord", "下載 Word"),
    ("preview", "預覽"),
    ("edit", "編輯"),
    ("cancel", "取消"),
];

const DE: &[(&str, &str)] = &[
    ("selectFile", "Datei auswählen"),
    ("convertNow", "Jetzt konvertieren"),
    ("converting", "Konvertierung läuft..."),
    ("supportedFormats", "Es werden nur PDF-Dateien unterstützt."),
    ("maxFileSize", "Die maximale Dateigröße beträgt 10 MB."),
    ("conversionFailed", "Konvertierung fehlgeschlagen. Bitte eine andere Datei versuchen."),
    ("exportFailed", "Export fehlgeschlagen. Ihr Markdown ist weiterhin verfügbar."),
    ("download", "Herunterladen"),
    ("preview", "Vorschau"),
    ("edit", "Bearbeiten"),
    ("cancel", "Abbrechen"),
];

const FR: &[(&str, &str)] = &[
    ("selectFile", "Choisir un fichier"),
    ("convertNow", "Convertir maintenant"),
    ("converting", "Conversion en cours..."),
    ("supportedFormats", "Seuls les fichiers PDF sont pris en charge."),
    ("maxFileSize", "La taille maximale est de 10 Mo."),
    ("conversionFailed", "La conversion a échoué. Essayez un autre fichier."),
    ("exportFailed", "L'export a échoué. Votre Markdown reste disponible."),
    ("download", "Télécharger"),
    ("preview", "Aperçu"),
    ("edit", "Modifier"),
    ("cancel", "Annuler"),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tags_and_aliases() {
        assert_eq!("en".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!("en-US".parse::<Locale>().unwrap(), Locale::En);
        assert_eq!("zh_CN".parse::<Locale>().unwrap(), Locale::ZhHans);
        assert_eq!("zh-Hant".parse::<Locale>().unwrap(), Locale::ZhHant);
        assert!("tlh".parse::<Locale>().is_err());
    }

    #[test]
    fn every_locale_round_trips_through_its_code() {
        for locale in Locale::ALL {
            assert_eq!(locale.code().parse::<Locale>().unwrap(), locale);
        }
    }

    #[test]
    fn lookup_prefers_locale_then_english() {
        let l = Localizer::new(Locale::ZhHans);
        assert_eq!(l.t("download"), "下载");
        // Not in the German table → English.
        let de = Localizer::new(Locale::De);
        assert_eq!(de.t("copiedToClipboard"), "Markdown copied to clipboard!");
    }

    #[test]
    fn unknown_key_falls_back_to_key_text() {
        let l = Localizer::new(Locale::Th);
        assert_eq!(l.t("someBrandNewKey"), "Some brand new key");
        assert_eq!(humanize_key("file_too_large"), "File too large");
        assert_eq!(humanize_key(""), "");
    }

    #[test]
    fn locale_change_notifies_subscribers() {
        let l = Localizer::new(Locale::En);
        let mut rx = l.subscribe();
        assert!(!rx.has_changed().unwrap());

        assert!(l.set_locale(Locale::Fr));
        assert!(rx.has_changed().unwrap());
        assert_eq!(*rx.borrow_and_update(), Locale::Fr);

        assert!(!l.set_locale(Locale::Fr), "same locale is not a change");
        assert!(!rx.has_changed().unwrap());
        assert_eq!(l.t("edit"), "Modifier");
    }

    #[test]
    fn rtl_locales() {
        assert!(Locale::Ar.is_rtl());
        assert!(!Locale::Hi.is_rtl());
    }
}
