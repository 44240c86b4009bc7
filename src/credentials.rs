use serde_json::Value;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use dirs::home_dir;

use crate::day::CalendarDay;
use crate::error::{Result, SlipError};

const CONFIG_FILE: &str = ".slip/config.json";

pub const DEFAULT_API_URL: &str = "https://api.track.toggl.com/api/v9";
pub const DEFAULT_REPORTS_URL: &str = "https://api.track.toggl.com/reports/api/v3";

#[derive(Debug, Clone)]
pub struct TogglSettings {
    pub api_token: String,
    pub workspace_id: String,
    pub api_url: String,
    pub reports_url: String,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub toggl: TogglSettings,
    pub start_date: Option<CalendarDay>,
    pub initial_hours: Option<f64>,
}

/// Env (after `.env`) wins over `~/.slip/config.json`.
pub fn load() -> Result<Settings> {
    dotenv::dotenv().ok();
    let file = read_config_file(&get_config_path())?;
    resolve(|key| env::var(key).ok(), &file)
}

fn read_config_file(path: &Path) -> Result<Value> {
    if !path.exists() {
        return Ok(Value::Null);
    }
    let content = fs::read_to_string(path)?;
    serde_json::from_str(&content)
        .map_err(|e| SlipError::Config(format!("{}: {}", path.display(), e)))
}

fn resolve(env_var: impl Fn(&str) -> Option<String>, file: &Value) -> Result<Settings> {
    let lookup = |env_key: &str, file_key: &str| {
        env_var(env_key).filter(|v| !v.trim().is_empty()).or_else(|| match file.get(file_key) {
            Some(Value::String(s)) => Some(s.clone()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => None,
        })
    };

    let api_token = lookup("TOGGL_API_TOKEN", "api_token")
        .ok_or_else(|| SlipError::Config("TOGGL_API_TOKEN is not set".to_string()))?;
    let workspace_id = lookup("TOGGL_WORKSPACE_ID", "workspace_id")
        .ok_or_else(|| SlipError::Config("TOGGL_WORKSPACE_ID is not set".to_string()))?;

    let start_date = lookup("SLIP_START_DATE", "start_date")
        .map(|s| s.trim().parse::<CalendarDay>())
        .transpose()?;

    let initial_hours = lookup("SLIP_INITIAL_HOURS", "initial_hours")
        .map(|s| {
            s.trim()
                .parse::<f64>()
                .map_err(|_| SlipError::Config(format!("SLIP_INITIAL_HOURS is not a number: {}", s)))
        })
        .transpose()?;

    Ok(Settings {
        toggl: TogglSettings {
            api_token,
            workspace_id,
            api_url: lookup("TOGGL_API_URL", "api_url").unwrap_or_else(|| DEFAULT_API_URL.to_string()),
            reports_url: lookup("TOGGL_REPORTS_URL", "reports_url")
                .unwrap_or_else(|| DEFAULT_REPORTS_URL.to_string()),
        },
        start_date,
        initial_hours,
    })
}

fn get_config_path() -> PathBuf {
    home_dir()
        .unwrap_or_else(|| PathBuf::from("/tmp"))
        .join(CONFIG_FILE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn env_overrides_file() {
        let file = json!({ "api_token": "from-file", "workspace_id": 7 });
        let settings = resolve(env_of(&[("TOGGL_API_TOKEN", "from-env")]), &file).unwrap();

        assert_eq!(settings.toggl.api_token, "from-env");
        assert_eq!(settings.toggl.workspace_id, "7");
        assert_eq!(settings.toggl.reports_url, DEFAULT_REPORTS_URL);
        assert!(settings.start_date.is_none());
    }

    #[test]
    fn missing_token_is_a_config_error() {
        let err = resolve(env_of(&[("TOGGL_WORKSPACE_ID", "1")]), &Value::Null).unwrap_err();
        assert!(matches!(err, SlipError::Config(_)));
    }

    #[test]
    fn optional_defaults_are_parsed() {
        let env = env_of(&[
            ("TOGGL_API_TOKEN", "t"),
            ("TOGGL_WORKSPACE_ID", "1"),
            ("SLIP_START_DATE", "2025-01-06"),
            ("SLIP_INITIAL_HOURS", "-3.5"),
        ]);
        let settings = resolve(env, &Value::Null).unwrap();

        assert_eq!(settings.start_date, "2025-01-06".parse::<CalendarDay>().ok());
        assert_eq!(settings.initial_hours, Some(-3.5));
    }

    #[test]
    fn bad_start_date_fails_fast() {
        let env = env_of(&[
            ("TOGGL_API_TOKEN", "t"),
            ("TOGGL_WORKSPACE_ID", "1"),
            ("SLIP_START_DATE", "06.01.2025"),
        ]);
        assert!(matches!(resolve(env, &Value::Null), Err(SlipError::InvalidDateFormat(_))));
    }
}
