#[cfg(test)]
mod tests {
    use std::io::Write;
    use std::time::Duration;

    use crate::configuration::types::LanguageConfig;
    use crate::configuration::Config;
    use crate::error_handling::types::ConfigError;

    fn sh_language() -> LanguageConfig {
        LanguageConfig {
            image: "alpine:3.20".to_string(),
            entry_filename: "main.sh".to_string(),
            run_command: vec!["sh".to_string(), "main.sh".to_string()],
        }
    }

    fn valid_config() -> Config {
        let mut config = Config::default();
        config.languages.insert("sh".to_string(), sh_language());
        config
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.max_sessions, 10);
        assert_eq!(config.admission_timeout_secs, 120);
        assert_eq!(config.idle_timeout_secs, 30);
        assert_eq!(config.detach_grace_secs, 60);
        assert_eq!(config.max_output_bytes, 1_048_576);
        assert_eq!(config.memory_limit_mb, 200);
        assert_eq!(config.cpu_limit, 0.5);
        assert_eq!(config.pids_limit, 32);
        assert_eq!(config.scratch_tmpfs_mb, 32);
        assert_eq!(config.docker_binary, "docker");
        assert!(config.languages.is_empty());

        assert_eq!(config.admission_timeout(), Duration::from_secs(120));
        assert_eq!(config.idle_timeout(), Duration::from_secs(30));
        assert_eq!(config.detach_grace(), Duration::from_secs(60));
    }

    #[test]
    fn validate_accepts_a_populated_config() {
        assert!(valid_config().validate().is_ok());
    }

    #[test]
    fn validate_requires_at_least_one_language() {
        let err = Config::default().validate().unwrap_err();
        assert!(matches!(err, ConfigError::LanguagesEmpty(_)));
    }

    #[test]
    fn validate_rejects_out_of_range_values() {
        let cases: Vec<Box<dyn Fn(&mut Config)>> = vec![
            Box::new(|c| c.max_sessions = 0),
            Box::new(|c| c.admission_timeout_secs = 0),
            Box::new(|c| c.idle_timeout_secs = 0),
            Box::new(|c| c.detach_grace_secs = 0),
            Box::new(|c| c.max_output_bytes = 512),
            Box::new(|c| c.memory_limit_mb = 2),
            Box::new(|c| c.cpu_limit = 0.0),
            Box::new(|c| c.pids_limit = 0),
        ];
        for broken in cases {
            let mut config = valid_config();
            broken(&mut config);
            let err = config.validate().unwrap_err();
            assert!(matches!(err, ConfigError::NotInRange(_)), "got: {}", err);
        }
    }

    #[test]
    fn validate_rejects_incomplete_languages() {
        let mut config = valid_config();
        config.languages.insert(
            "broken".to_string(),
            LanguageConfig {
                image: String::new(),
                entry_filename: "main.txt".to_string(),
                run_command: vec!["run".to_string()],
            },
        );
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::LanguagesEmpty(_)));
    }

    #[test]
    fn from_file_applies_overrides_over_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
max_sessions = 3
idle_timeout_secs = 5

[languages.sh]
image = "alpine:3.20"
entry_filename = "main.sh"
run_command = ["sh", "main.sh"]
"#
        )
        .unwrap();

        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.max_sessions, 3);
        assert_eq!(config.idle_timeout_secs, 5);
        // Everything not named keeps its default.
        assert_eq!(config.admission_timeout_secs, 120);
        assert_eq!(config.languages.get("sh"), Some(&sh_language()));
    }

    #[test]
    fn from_file_reports_missing_files_and_bad_toml() {
        let err = Config::from_file(std::path::Path::new("/nonexistent/kiln.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::IoError(_)));

        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "max_sessions = \"many\"").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::TomlError(_)));
    }

    #[test]
    fn from_file_rejects_invalid_values() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"
max_sessions = 0

[languages.sh]
image = "alpine:3.20"
entry_filename = "main.sh"
run_command = ["sh", "main.sh"]
"#
        )
        .unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::NotInRange(_)));
    }
}
