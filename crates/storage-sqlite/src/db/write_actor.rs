//! Serialized write actor.
//!
//! SQLite allows one writer at a time; funnelling every mutation through a
//! single dedicated thread avoids `SQLITE_BUSY` storms under concurrent async
//! callers. Each job runs inside its own immediate transaction.

use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use log::error;
use tokio::sync::{mpsc, oneshot};

use ledgerlink_core::errors::Result;

use crate::errors::StorageError;

type Job = Box<dyn FnOnce(&mut SqliteConnection) + Send + 'static>;

/// Transaction error carrier: distinguishes diesel's own rollback errors from
/// errors raised by the job closure.
enum TxError {
    App(ledgerlink_core::Error),
    Diesel(diesel::result::Error),
}

impl From<diesel::result::Error> for TxError {
    fn from(err: diesel::result::Error) -> Self {
        Self::Diesel(err)
    }
}

/// Cloneable handle to the write actor.
#[derive(Clone)]
pub struct WriteHandle {
    tx: mpsc::UnboundedSender<Job>,
}

impl WriteHandle {
    /// Run `f` on the writer thread inside an immediate transaction.
    ///
    /// The closure's error rolls the transaction back and is returned to the
    /// caller unchanged.
    pub async fn exec<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let (result_tx, result_rx) = oneshot::channel::<Result<T>>();

        let job: Job = Box::new(move |conn| {
            let outcome = conn
                .immediate_transaction::<T, TxError, _>(|tx| f(tx).map_err(TxError::App))
                .map_err(|err| match err {
                    TxError::App(e) => e,
                    TxError::Diesel(e) => StorageError::from(e).into(),
                });
            let _ = result_tx.send(outcome);
        });

        self.tx.send(job).map_err(|_| {
            ledgerlink_core::Error::from(StorageError::WriterUnavailable(
                "write actor has shut down".to_string(),
            ))
        })?;

        result_rx.await.map_err(|_| {
            ledgerlink_core::Error::from(StorageError::WriterUnavailable(
                "write actor dropped the job".to_string(),
            ))
        })?
    }
}

/// Spawn the writer thread over its own pooled connection.
pub fn spawn_writer(pool: Pool<ConnectionManager<SqliteConnection>>) -> WriteHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

    std::thread::Builder::new()
        .name("sqlite-writer".to_string())
        .spawn(move || {
            while let Some(job) = rx.blocking_recv() {
                match pool.get() {
                    Ok(mut conn) => job(&mut conn),
                    // Dropping the job closes its result channel; the caller
                    // sees WriterUnavailable.
                    Err(e) => error!("Writer could not check out a connection: {}", e),
                }
            }
        })
        .ok();

    WriteHandle { tx }
}
