use diesel::r2d2::{self, Pool};
use diesel::sqlite::SqliteConnection;
use std::sync::Arc;
use tempfile::tempdir;

use crate::db::{create_pool, init, run_migrations, write_actor::spawn_writer, WriteHandle};

pub(crate) fn setup_db() -> (
    Arc<Pool<r2d2::ConnectionManager<SqliteConnection>>>,
    WriteHandle,
) {
    let app_data = tempdir()
        .expect("tempdir")
        .keep()
        .to_string_lossy()
        .to_string();
    let db_path = init(&app_data).expect("init db");
    run_migrations(&db_path).expect("migrate db");
    let pool = create_pool(&db_path).expect("create pool");
    let writer = spawn_writer(pool.as_ref().clone());
    (pool, writer)
}
