#[cfg(test)]
mod tests {
    use std::path::Path;

    use serial_test::serial;
    use temp_env::with_vars;

    use crate::config::{DataProvider, PortalConfig};
    use crate::error::AppError;

    fn unset_all() -> Vec<(&'static str, Option<&'static str>)> {
        vec![
            ("DATA_PROVIDER", None),
            ("DATA_DIR", None),
            ("DATABASE_URL", None),
            ("CHALLENGE_DIR", None),
            ("SESSION_HOURS", None),
        ]
    }

    #[test]
    #[serial]
    fn test_config_defaults() {
        with_vars(unset_all(), || {
            let config = PortalConfig::from_env().expect("Failed to read config");
            assert_eq!(config.data_provider, DataProvider::File);
            assert_eq!(config.data_dir, Path::new("data"));
            assert_eq!(config.challenge_dir, Path::new("challenges"));
            assert_eq!(config.database_url, "");
            assert_eq!(config.session_hours, 12);
            assert_eq!(config.session_ttl(), chrono::Duration::hours(12));
        });
    }

    #[test]
    #[serial]
    fn test_config_reads_explicit_values() {
        with_vars(
            [
                ("DATA_PROVIDER", Some("SQLite")),
                ("DATA_DIR", Some("/var/lib/portal")),
                ("DATABASE_URL", Some("sqlite://data/portal.db")),
                ("CHALLENGE_DIR", Some("/etc/portal/challenges")),
                ("SESSION_HOURS", Some("48")),
            ],
            || {
                let config = PortalConfig::from_env().expect("Failed to read config");
                assert_eq!(config.data_provider, DataProvider::Sqlite);
                assert_eq!(config.data_dir, Path::new("/var/lib/portal"));
                assert_eq!(config.database_url, "sqlite://data/portal.db");
                assert_eq!(config.challenge_dir, Path::new("/etc/portal/challenges"));
                assert_eq!(config.session_hours, 48);
            },
        );
    }

    #[test]
    #[serial]
    fn test_sqlite_requires_database_url() {
        let mut vars = unset_all();
        vars[0] = ("DATA_PROVIDER", Some("sqlite"));

        with_vars(vars, || match PortalConfig::from_env() {
            Err(AppError::Configuration(message)) => {
                assert_eq!(message, "DATABASE_URL must be set when DATA_PROVIDER is 'sqlite'")
            }
            other => panic!("Expected a configuration error, got {:?}", other),
        });
    }

    #[test]
    #[serial]
    fn test_unknown_provider_is_rejected() {
        let mut vars = unset_all();
        vars[0] = ("DATA_PROVIDER", Some("postgres"));

        with_vars(vars, || match PortalConfig::from_env() {
            Err(AppError::Configuration(message)) => assert_eq!(
                message,
                "unsupported data provider 'postgres', expected 'file' or 'sqlite'"
            ),
            other => panic!("Expected a configuration error, got {:?}", other),
        });
    }

    #[test]
    #[serial]
    fn test_session_hours_must_be_a_positive_integer() {
        for (value, expected) in [
            ("0", "SESSION_HOURS must be positive"),
            ("-3", "SESSION_HOURS must be positive"),
            ("abc", "SESSION_HOURS must be an integer, got 'abc'"),
        ] {
            let mut vars = unset_all();
            vars[4] = ("SESSION_HOURS", Some(value));

            with_vars(vars, || match PortalConfig::from_env() {
                Err(AppError::Configuration(message)) => assert_eq!(message, expected),
                other => panic!("Expected a configuration error, got {:?}", other),
            });
        }
    }
}
