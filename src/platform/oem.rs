//! Manufacturer-specific instructions for keeping alarms reliable.
//!
//! Some vendors ship aggressive power managers that kill background
//! processes regardless of system settings. The text below tells the user
//! where to exempt the app. Lookup is case-insensitive; unknown
//! manufacturers get the generic instructions.

/// Instructions keyed by manufacturer.
static OEM_INSTRUCTIONS: &[(&[&str], &str)] = &[
    (
        &["xiaomi"],
        "Xiaomi 端末:\n\
         1. 設定 → アプリ → wakeup → バッテリーセーバー → 制限なし\n\
         2. 設定 → アプリ → wakeup → その他の権限 → バックグラウンドでのポップアップ表示 → 許可\n\
         3. 設定 → アプリ → wakeup → 自動起動 → 有効",
    ),
    (
        &["huawei", "honor"],
        "Huawei/Honor 端末:\n\
         1. 設定 → アプリ → wakeup → バッテリー → アプリ起動 → 手動で管理\n\
         2. 自動起動・二次起動・バックグラウンドで実行 をすべて有効\n\
         3. 設定 → バッテリー → その他のバッテリー設定 → スリープ中もアプリを終了しない",
    ),
    (
        &["oppo", "oneplus"],
        "Oppo/OnePlus 端末:\n\
         1. 設定 → アプリ → wakeup → バッテリー → 最適化しない\n\
         2. 設定 → アプリ → wakeup → アプリの権限 → すべて許可\n\
         3. 設定 → バッテリー → バッテリーの最適化 → wakeup → 最適化しない",
    ),
    (
        &["vivo"],
        "Vivo 端末:\n\
         1. 設定 → アプリと権限 → wakeup → バッテリー → バックグラウンドでの高消費 → 許可\n\
         2. 設定 → アプリと権限 → wakeup → 自動起動 → 有効\n\
         3. 設定 → バッテリー → バックグラウンド更新 → wakeup → 許可",
    ),
    (
        &["samsung"],
        "Samsung 端末:\n\
         1. 設定 → アプリ → wakeup → バッテリー → バッテリー使用量の最適化 → オフ\n\
         2. 設定 → デバイスケア → バッテリー → スリープさせないアプリ → wakeup を追加\n\
         3. 設定 → アプリ → wakeup → 権限 → すべて許可",
    ),
];

const DEFAULT_INSTRUCTIONS: &str = "アラームを確実に鳴らすには:\n\
     1. 省電力設定で wakeup を最適化の対象外にしてください\n\
     2. 通知を許可してください\n\
     3. wakeup install でログイン時に自動起動するようにしてください";

/// Returns the instructions for `manufacturer`.
#[must_use]
pub fn oem_instructions(manufacturer: &str) -> &'static str {
    let manufacturer = manufacturer.trim().to_lowercase();
    OEM_INSTRUCTIONS
        .iter()
        .find(|(names, _)| names.contains(&manufacturer.as_str()))
        .map_or(DEFAULT_INSTRUCTIONS, |(_, text)| text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_manufacturers() {
        assert!(oem_instructions("xiaomi").starts_with("Xiaomi"));
        assert!(oem_instructions("samsung").starts_with("Samsung"));
        assert!(oem_instructions("vivo").starts_with("Vivo"));
    }

    #[test]
    fn test_shared_entries() {
        assert_eq!(oem_instructions("huawei"), oem_instructions("honor"));
        assert_eq!(oem_instructions("oppo"), oem_instructions("oneplus"));
    }

    #[test]
    fn test_case_insensitive() {
        assert_eq!(oem_instructions("Xiaomi"), oem_instructions("xiaomi"));
        assert_eq!(oem_instructions(" SAMSUNG "), oem_instructions("samsung"));
    }

    #[test]
    fn test_unknown_falls_back() {
        assert_eq!(oem_instructions("apple"), DEFAULT_INSTRUCTIONS);
        assert_eq!(oem_instructions(""), DEFAULT_INSTRUCTIONS);
    }

    #[test]
    fn test_every_entry_has_three_steps() {
        for (_, text) in OEM_INSTRUCTIONS {
            assert!(text.contains("3. "));
        }
        assert!(DEFAULT_INSTRUCTIONS.contains("3. "));
    }
}
