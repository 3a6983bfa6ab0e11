use std::collections::HashMap;
use std::fs;
use std::path::Path;
use tracing::{debug, warn};

use super::language::Language;

/// A display string in every supported language
#[derive(Debug, Clone, Copy)]
pub struct LocalizedMessage {
    pub ja: &'static str,
    pub en: &'static str,
}

impl LocalizedMessage {
    pub const fn new(ja: &'static str, en: &'static str) -> Self {
        Self { ja, en }
    }

    pub fn get(&self, lang: Language) -> &'static str {
        match lang {
            Language::Japanese => self.ja,
            Language::English => self.en,
        }
    }
}

/// Built-in string table, keyed the same way as the `lang/<code>.json` files
pub const BUILTIN_MESSAGES: &[(&str, LocalizedMessage)] = &[
    ("title", LocalizedMessage::new("置き換え君 {version}", "MultReplacer {version}")),
    ("path_label", LocalizedMessage::new("パス:", "Path:")),
    ("browse", LocalizedMessage::new("参照", "Browse")),
    (
        "caution",
        LocalizedMessage::new(
            "注意: 置換結果は元のファイルに直接上書きされます。",
            "Caution: the result overwrites the original file.",
        ),
    ),
    ("add", LocalizedMessage::new("追加", "Add")),
    ("execute", LocalizedMessage::new("実行", "Execute")),
    ("delete", LocalizedMessage::new("削除", "Delete")),
    ("confirm_title", LocalizedMessage::new("確認", "Confirm")),
    ("confirm_prompt", LocalizedMessage::new("この内容で保存しますか? [y/N]", "Save these changes? [y/N]")),
    ("cancel", LocalizedMessage::new("キャンセル", "Cancel")),
    ("cancelled", LocalizedMessage::new("キャンセルしました。", "Cancelled.")),
    ("completed", LocalizedMessage::new("完了", "Completed")),
    ("replace_done", LocalizedMessage::new("置換が完了しました。", "Replacement completed.")),
    ("replace_summary", LocalizedMessage::new("{count} 箇所を置換します", "{count} replacement(s) will be made")),
    ("no_changes", LocalizedMessage::new("変更はありません。", "No changes.")),
    ("error", LocalizedMessage::new("エラー", "Error")),
    ("invalid_path", LocalizedMessage::new("無効なファイルパスです", "Invalid file path")),
    ("before", LocalizedMessage::new("置換前", "Before")),
    ("after", LocalizedMessage::new("置換後", "After")),
    ("update_current_version", LocalizedMessage::new("現在のバージョン: {version}", "Current version: {version}")),
    ("update_latest_version", LocalizedMessage::new("最新のバージョン: {version}", "Latest version: {version}")),
    ("update_up_to_date", LocalizedMessage::new("すでに最新のバージョンです。", "Already up to date.")),
    ("update_restarting", LocalizedMessage::new("新しいバージョン {version} で再起動します", "Restarting into version {version}")),
    ("update_failed", LocalizedMessage::new("アップデート中にエラーが発生しました: {error}", "An error occurred during the update: {error}")),
    ("update_disabled", LocalizedMessage::new("アップデート確認は無効です", "Update check is disabled")),
    ("error_network", LocalizedMessage::new("サーバーに接続できませんでした: {error}", "Could not reach the release server: {error}")),
    ("error_asset_not_found", LocalizedMessage::new("ダウンロード可能なアセットが見つかりませんでした", "No downloadable asset was found")),
    (
        "error_filesystem",
        LocalizedMessage::new(
            "実行ファイルの置き換えに失敗しました。次回起動時に復元されます: {error}",
            "Replacing the executable failed; it will be restored on next start: {error}",
        ),
    ),
    ("error_encoding", LocalizedMessage::new("ファイルが UTF-8 ではありません: {error}", "The file is not valid UTF-8: {error}")),
    ("error_checksum_mismatch", LocalizedMessage::new("ダウンロードしたファイルが破損しています: {error}", "The downloaded file is corrupted: {error}")),
];

/// Looks up display strings for one language
#[derive(Debug, Clone)]
pub struct Translator {
    language: Language,
    overrides: HashMap<String, String>,
}

impl Translator {
    /// Translator with only the built-in strings
    pub fn new(language: Language) -> Self {
        Self {
            language,
            overrides: HashMap::new(),
        }
    }

    /// Translator overlaying `lang_dir/<code>.json` on the built-ins.
    ///
    /// A missing file is normal. A malformed one is logged and ignored.
    pub fn load(language: Language, lang_dir: impl AsRef<Path>) -> Self {
        let mut translator = Self::new(language);
        let path = lang_dir.as_ref().join(format!("{}.json", language.code()));

        if !path.exists() {
            debug!("No language file at {}, using built-in strings", path.display());
            return translator;
        }

        match fs::read_to_string(&path)
            .map_err(|e| e.to_string())
            .and_then(|raw| {
                serde_json::from_str::<HashMap<String, String>>(&raw).map_err(|e| e.to_string())
            }) {
            Ok(map) => {
                debug!("Loaded {} strings from {}", map.len(), path.display());
                translator.overrides = map;
            }
            Err(e) => warn!("Ignoring language file {}: {}", path.display(), e),
        }

        translator
    }

    pub fn language(&self) -> Language {
        self.language
    }

    /// Look up a string; unknown keys come back unchanged
    pub fn tr<'a>(&'a self, key: &'a str) -> &'a str {
        if let Some(value) = self.overrides.get(key) {
            return value;
        }
        BUILTIN_MESSAGES
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, msg)| msg.get(self.language))
            .unwrap_or(key)
    }

    /// Look up a string and substitute `{name}` placeholders
    pub fn tr_with(&self, key: &str, args: &[(&str, &str)]) -> String {
        let mut text = self.tr(key).to_string();
        for (name, value) in args {
            text = text.replace(&format!("{{{}}}", name), value);
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_builtin_lookup() {
        let ja = Translator::new(Language::Japanese);
        let en = Translator::new(Language::English);
        assert_eq!(ja.tr("execute"), "実行");
        assert_eq!(en.tr("execute"), "Execute");
    }

    #[test]
    fn test_latest_version_message() {
        let ja = Translator::new(Language::Japanese);
        let en = Translator::new(Language::English);
        assert_eq!(
            ja.tr_with("update_latest_version", &[("version", "v1.1.0")]),
            "最新のバージョン: v1.1.0"
        );
        assert_eq!(
            en.tr_with("update_latest_version", &[("version", "v1.1.0")]),
            "Latest version: v1.1.0"
        );
    }

    #[test]
    fn test_unknown_key_falls_back_to_key() {
        let t = Translator::new(Language::English);
        assert_eq!(t.tr("no_such_key"), "no_such_key");
    }

    #[test]
    fn test_title_placeholder() {
        let t = Translator::new(Language::Japanese);
        assert_eq!(t.tr_with("title", &[("version", "v1.0.1")]), "置き換え君 v1.0.1");
    }

    #[test]
    fn test_every_builtin_key_is_unique() {
        let mut keys: Vec<_> = BUILTIN_MESSAGES.iter().map(|(k, _)| *k).collect();
        keys.sort_unstable();
        let before = keys.len();
        keys.dedup();
        assert_eq!(before, keys.len());
    }

    #[test]
    fn test_language_file_overrides_builtin() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("en.json"), r#"{"execute": "Run"}"#).unwrap();

        let t = Translator::load(Language::English, dir.path());
        assert_eq!(t.tr("execute"), "Run");
        assert_eq!(t.tr("cancel"), "Cancel");
    }

    #[test]
    fn test_malformed_language_file_is_ignored() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("ja.json"), "not json").unwrap();

        let t = Translator::load(Language::Japanese, dir.path());
        assert_eq!(t.tr("cancel"), "キャンセル");
    }
}
