//! Single writer thread. Every mutation runs here, one at a time, inside a
//! transaction, so SQLite never sees competing writers.

use diesel::connection::Connection;
use diesel::sqlite::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use bioquest_core::errors::{DatabaseError, Error, Result};

use super::{DbConnection, DbPool};

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Errors that can leave a write transaction.
enum TxError {
    Diesel(diesel::result::Error),
    App(Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        TxError::Diesel(err)
    }
}

#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl WriteHandle {
    /// Runs `job` on the writer connection in one transaction. An `Err` from
    /// the closure rolls the transaction back.
    pub async fn exec<F, T>(&self, job: F) -> Result<T>
    where
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let boxed: Job = Box::new(move |conn: &mut SqliteConnection| {
            let outcome = conn.transaction::<T, TxError, _>(|tx| job(tx).map_err(TxError::App));
            let result = match outcome {
                Ok(value) => Ok(value),
                Err(TxError::App(err)) => Err(err),
                Err(TxError::Diesel(err)) => {
                    Err(Error::Database(DatabaseError::QueryFailed(err.to_string())))
                }
            };
            let _ = reply_tx.send(result);
        });

        self.tx
            .send(boxed)
            .map_err(|_| Error::Database(DatabaseError::Internal("writer has stopped".into())))?;
        reply_rx.await.map_err(|_| {
            Error::Database(DatabaseError::Internal(
                "writer dropped the request".into(),
            ))
        })?
    }
}

/// Starts the writer thread. It lives until every handle is dropped.
pub fn spawn_writer(pool: DbPool) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();
    std::thread::Builder::new()
        .name("bioquest-db-writer".into())
        .spawn(move || {
            let mut conn: Option<DbConnection> = None;
            while let Some(job) = rx.blocking_recv() {
                if conn.is_none() {
                    match pool.get() {
                        Ok(c) => conn = Some(c),
                        Err(e) => {
                            // Dropping the job answers the caller with an error.
                            error!("Writer could not get a connection: {}", e);
                            continue;
                        }
                    }
                }
                if let Some(c) = conn.as_mut() {
                    job(&mut **c);
                }
            }
        })
        .map(|_| ())
        .unwrap_or_else(|e| error!("Failed to start writer thread: {}", e));
    WriteHandle { tx }
}
