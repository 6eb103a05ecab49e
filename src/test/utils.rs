#[cfg(test)]
pub mod test_portal {
    use std::fs;
    use std::sync::{Arc, Once};

    use rocket::http::{ContentType, Cookie, Status};
    use rocket::local::asynchronous::Client;
    use serde_json::json;
    use sqlx::sqlite::SqlitePoolOptions;
    use tempfile::TempDir;

    use crate::auth::{Role, SESSION_COOKIE, UserAccount};
    use crate::challenges::ChallengeSet;
    use crate::config::{DataProvider, PortalConfig};
    use crate::events::EventHub;
    use crate::init_rocket;
    use crate::locks::TeamLocks;
    use crate::progress::ChallengeService;
    use crate::store::Storage;
    use crate::store::file::FileStore;
    use crate::store::sqlite::SqliteStore;
    use crate::timer::TimerService;

    static INIT: Once = Once::new();
    pub static STANDARD_PASSWORD: &str = "password123";

    // Cost 4 keeps test hashing fast; production uses the default cost.
    pub fn test_hash(password: &str) -> String {
        bcrypt::hash(password, 4).expect("Failed to hash test password")
    }

    #[derive(Default)]
    pub struct TestPortalBuilder {
        users: Vec<UserAccount>,
        challenges: Vec<String>,
        sqlite: bool,
    }

    impl TestPortalBuilder {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn participant(mut self, username: &str, display_name: Option<&str>, team: &str) -> Self {
            self.users.push(UserAccount {
                username: username.to_string(),
                password_hash: test_hash(STANDARD_PASSWORD),
                role: Role::Participant,
                team: Some(team.to_string()),
                display_name: display_name.map(String::from),
            });
            self
        }

        pub fn coach(mut self, username: &str, display_name: Option<&str>, team: &str) -> Self {
            self.users.push(UserAccount {
                username: username.to_string(),
                password_hash: test_hash(STANDARD_PASSWORD),
                role: Role::Coach,
                team: Some(team.to_string()),
                display_name: display_name.map(String::from),
            });
            self
        }

        pub fn techlead(mut self, username: &str, display_name: Option<&str>) -> Self {
            self.users.push(UserAccount {
                username: username.to_string(),
                password_hash: test_hash(STANDARD_PASSWORD),
                role: Role::Techlead,
                team: None,
                display_name: display_name.map(String::from),
            });
            self
        }

        pub fn user_with_password(
            mut self,
            username: &str,
            role: Role,
            team: Option<&str>,
            password: &str,
        ) -> Self {
            self.users.push(UserAccount {
                username: username.to_string(),
                password_hash: test_hash(password),
                role,
                team: team.map(String::from),
                display_name: None,
            });
            self
        }

        pub fn challenge(mut self, markdown: &str) -> Self {
            self.challenges.push(markdown.to_string());
            self
        }

        pub fn sqlite(mut self) -> Self {
            self.sqlite = true;
            self
        }

        async fn prepare(self) -> (Storage, Arc<ChallengeSet>, PortalConfig, TempDir, TempDir) {
            INIT.call_once(|| {
                let _ = tracing_subscriber::fmt()
                    .with_env_filter("info")
                    .with_test_writer()
                    .try_init();
            });

            let challenge_dir = TempDir::new().expect("Failed to create challenge dir");
            for (index, markdown) in self.challenges.iter().enumerate() {
                let filename = format!("challenge-{:03}.md", index + 1);
                fs::write(challenge_dir.path().join(filename), markdown)
                    .expect("Failed to write challenge file");
            }
            let challenges = Arc::new(
                ChallengeSet::load(challenge_dir.path()).expect("Failed to load challenges"),
            );

            let data_dir = TempDir::new().expect("Failed to create data dir");
            let storage = if self.sqlite {
                let pool = SqlitePoolOptions::new()
                    .max_connections(1)
                    .connect("sqlite::memory:")
                    .await
                    .expect("Failed to open in-memory database");
                let store = SqliteStore::with_pool(pool)
                    .await
                    .expect("Failed to apply schema");
                Storage::sqlite(store)
            } else {
                Storage::file(FileStore::open(data_dir.path()).expect("Failed to open file store"))
            };

            for account in &self.users {
                storage
                    .users
                    .upsert(account)
                    .await
                    .expect("Failed to seed test user");
            }

            let config = PortalConfig {
                data_provider: if self.sqlite {
                    DataProvider::Sqlite
                } else {
                    DataProvider::File
                },
                data_dir: data_dir.path().to_path_buf(),
                database_url: String::new(),
                challenge_dir: challenge_dir.path().to_path_buf(),
                session_hours: 12,
            };

            (storage, challenges, config, challenge_dir, data_dir)
        }

        pub async fn build(self) -> TestPortal {
            let (storage, challenges, config, challenge_dir, data_dir) = self.prepare().await;

            let client = Client::untracked(
                init_rocket(config, storage.clone(), challenges.clone()).await,
            )
            .await
            .expect("Failed to build test client");

            TestPortal {
                client,
                storage,
                challenges,
                _challenge_dir: challenge_dir,
                _data_dir: data_dir,
            }
        }

        pub async fn build_services(self) -> TestServices {
            let (storage, challenges, _, challenge_dir, data_dir) = self.prepare().await;

            let locks = TeamLocks::new();
            let hub = EventHub::new();
            let timers = TimerService::new(storage.clone(), locks.clone(), hub.clone());
            let service = ChallengeService::new(
                storage.clone(),
                challenges.clone(),
                timers.clone(),
                locks,
                hub.clone(),
            );

            TestServices {
                service,
                timers,
                storage,
                hub,
                challenges,
                _challenge_dir: challenge_dir,
                _data_dir: data_dir,
            }
        }
    }

    /// A portal mounted behind a local Rocket client.
    pub struct TestPortal {
        pub client: Client,
        pub storage: Storage,
        pub challenges: Arc<ChallengeSet>,
        _challenge_dir: TempDir,
        _data_dir: TempDir,
    }

    /// The service layer without the HTTP surface.
    pub struct TestServices {
        pub service: ChallengeService,
        pub timers: TimerService,
        pub storage: Storage,
        pub hub: EventHub,
        pub challenges: Arc<ChallengeSet>,
        _challenge_dir: TempDir,
        _data_dir: TempDir,
    }

    /// Two teams, all three roles, three challenges.
    pub async fn standard_portal() -> TestPortal {
        standard_builder().build().await
    }

    pub fn standard_builder() -> TestPortalBuilder {
        TestPortalBuilder::new()
            .participant("participant_user", Some("Participant User"), "alpha")
            .coach("coach_user", Some("Coach User"), "alpha")
            .participant("bravo_user", Some("Bravo User"), "bravo")
            .techlead("techlead_user", Some("Techlead User"))
            .challenge("# First Steps\n\nStand up the project skeleton and say hello.\n")
            .challenge("# Wire the Store\n\nPersist team state behind the repository layer.\n")
            .challenge("# Ship It\n\nDeploy the portal and demo it to the room.\n")
    }

    pub async fn login(client: &Client, username: &str, password: &str) -> Cookie<'static> {
        let response = client
            .post("/api/login")
            .header(ContentType::JSON)
            .body(
                json!({
                    "username": username,
                    "password": password
                })
                .to_string(),
            )
            .dispatch()
            .await;

        assert_eq!(response.status(), Status::Ok, "Login failed for {}", username);

        response
            .cookies()
            .get_private(SESSION_COOKIE)
            .expect("Login did not set a session cookie")
    }
}
