use crate::db::models::{Position, Theme};
use crate::db::Database;
use crate::error::WidgetError;
use std::collections::HashMap;

const SETTING_KEYS: &[&str] = &["api_base_url", "api_key", "bot_name", "theme", "position"];

/// Stored settings, with the API key masked for display. Changes apply the
/// next time the widget is built.
pub fn get_settings(db: &Database) -> Result<HashMap<String, String>, WidgetError> {
    let mut map = HashMap::new();
    for key in SETTING_KEYS {
        if let Some(value) = db.get_setting(key)? {
            if *key == "api_key" {
                map.insert(key.to_string(), mask(&value));
            } else {
                map.insert(key.to_string(), value);
            }
        }
    }
    Ok(map)
}

fn mask(value: &str) -> String {
    let chars: Vec<char> = value.chars().collect();
    if chars.len() <= 8 {
        return value.to_string();
    }
    let head: String = chars[..4].iter().collect();
    let tail: String = chars[chars.len() - 4..].iter().collect();
    format!("{}...{}", head, tail)
}

pub fn set_setting(db: &Database, key: &str, value: &str) -> Result<(), WidgetError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(WidgetError::UnknownSetting(key.to_string()));
    }
    let value = value.trim();
    match key {
        "theme" => {
            value.parse::<Theme>().map_err(WidgetError::Validation)?;
        }
        "position" => {
            value.parse::<Position>().map_err(WidgetError::Validation)?;
        }
        _ => {}
    }
    db.set_setting(key, value)?;
    Ok(())
}

pub fn delete_setting(db: &Database, key: &str) -> Result<(), WidgetError> {
    if !SETTING_KEYS.contains(&key) {
        return Err(WidgetError::UnknownSetting(key.to_string()));
    }
    db.delete_setting(key)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::WidgetConfig;

    #[test]
    fn test_api_key_is_masked() {
        let db = Database::in_memory().unwrap();
        set_setting(&db, "api_key", "sk-1234567890abcd").unwrap();
        set_setting(&db, "bot_name", "Helper").unwrap();

        let settings = get_settings(&db).unwrap();
        assert_eq!(settings["api_key"], "sk-1...abcd");
        assert_eq!(settings["bot_name"], "Helper");
        assert!(!settings.contains_key("theme"));

        set_setting(&db, "api_key", "short").unwrap();
        assert_eq!(get_settings(&db).unwrap()["api_key"], "short");
    }

    #[test]
    fn test_rejects_unknown_keys_and_bad_values() {
        let db = Database::in_memory().unwrap();
        assert!(matches!(
            set_setting(&db, "openai_api_key", "x"),
            Err(WidgetError::UnknownSetting(_))
        ));
        assert!(matches!(
            set_setting(&db, "theme", "purple"),
            Err(WidgetError::Validation(_))
        ));
        assert!(matches!(
            delete_setting(&db, "nope"),
            Err(WidgetError::UnknownSetting(_))
        ));
    }

    #[test]
    fn test_saved_settings_feed_config() {
        let db = Database::in_memory().unwrap();
        set_setting(&db, "theme", "dark").unwrap();
        set_setting(&db, "position", "bottom-left").unwrap();
        set_setting(&db, "api_base_url", "http://example.test/api").unwrap();

        let mut config = WidgetConfig::default();
        config.apply_settings(&db);
        assert_eq!(config.options.theme, Theme::Dark);
        assert_eq!(config.options.position, Position::BottomLeft);
        assert_eq!(config.api_base_url, "http://example.test/api");

        delete_setting(&db, "theme").unwrap();
        let mut config = WidgetConfig::default();
        config.apply_settings(&db);
        assert_eq!(config.options.theme, Theme::Light);
    }
}
