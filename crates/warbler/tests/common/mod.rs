//! Test utilities and common setup.

use warbler::auth::PasswordHasher;
use warbler::db::Database;
use warbler::user::UserService;

/// A fresh database holding two committed users, `u1` and `u2`.
pub struct Fixture {
    pub db: Database,
    pub users: UserService,
    pub u1_id: i64,
    pub u2_id: i64,
}

/// Lowest bcrypt cost, to keep hashing fast in tests.
pub fn test_service() -> UserService {
    UserService::new(PasswordHasher::new(PasswordHasher::MIN_COST))
}

pub async fn fixture() -> Fixture {
    let db = Database::in_memory().await.unwrap();
    let users = test_service();

    let mut session = db.begin().await.unwrap();
    let u1 = users
        .register(session.conn(), "u1", "u1@email.com", "password", None)
        .await
        .unwrap();
    let u2 = users
        .register(session.conn(), "u2", "u2@email.com", "password", None)
        .await
        .unwrap();
    session.commit().await.unwrap();

    Fixture {
        db,
        users,
        u1_id: u1.id,
        u2_id: u2.id,
    }
}
