use std::time::Duration;

use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sql_types::BigInt;
use diesel::{sql_query, RunQueryDsl};
use diesel_migrations::{embed_migrations, EmbeddedMigrations, MigrationHarness};
use uuid::Uuid;

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub const DEFAULT_MAX_POOL_SIZE: u32 = 2;

pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

pub fn init_pool(database_url: &str) -> anyhow::Result<PgPool> {
    init_pool_with_size(database_url, DEFAULT_MAX_POOL_SIZE)
}

pub fn init_pool_with_size(database_url: &str, max_size: u32) -> anyhow::Result<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    let pool_size = max_size.max(1);
    let pool = Pool::builder()
        .max_size(pool_size)
        .connection_timeout(Duration::from_secs(10))
        .build(manager)?;
    Ok(pool)
}

pub fn run_migrations(pool: &PgPool) -> anyhow::Result<()> {
    let mut conn = pool.get()?;
    conn.run_pending_migrations(MIGRATIONS)
        .map_err(|err| anyhow::anyhow!("failed to run migrations: {err}"))?;
    Ok(())
}

/// Takes the per-document transaction lock. Released on commit or rollback.
pub fn lock_document(
    conn: &mut PgConnection,
    document_id: Uuid,
) -> Result<(), diesel::result::Error> {
    sql_query("SELECT pg_advisory_xact_lock($1)")
        .bind::<BigInt, _>(advisory_key(document_id))
        .execute(conn)?;
    Ok(())
}

fn advisory_key(id: Uuid) -> i64 {
    let bytes = id.as_bytes();
    let mut head = [0u8; 8];
    head.copy_from_slice(&bytes[..8]);
    let mut tail = [0u8; 8];
    tail.copy_from_slice(&bytes[8..]);
    i64::from_be_bytes(head) ^ i64::from_be_bytes(tail)
}

#[cfg(test)]
mod tests {
    use super::advisory_key;
    use uuid::Uuid;

    #[test]
    fn advisory_key_is_stable_per_document() {
        let id = Uuid::parse_str("6f1c4a2e-8f3b-4d7a-9a1e-2b3c4d5e6f70").unwrap();
        assert_eq!(advisory_key(id), advisory_key(id));
        assert_ne!(advisory_key(id), advisory_key(Uuid::new_v4()));
    }
}
