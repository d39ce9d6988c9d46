//! SQL Server client over TDS.
//!
//! One TCP connection per run, opened with SQL authentication. The async
//! client is driven by a private current-thread runtime so the rest of the
//! tracker stays synchronous.

use chrono::{NaiveDate, NaiveDateTime, NaiveTime, Utc};
use tiberius::{AuthMethod, Client, ColumnData, Config, EncryptionLevel, FromSql, ToSql};
use tokio::net::TcpStream;
use tokio::runtime::Runtime;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use super::{Cell, SqlParam, Table, Warehouse, WarehouseError};
use crate::config::{Credentials, WarehouseSettings};

type TdsClient = Client<Compat<TcpStream>>;

pub struct MssqlWarehouse {
    runtime: Runtime,
    client: Option<TdsClient>,
    server: String,
}

fn query_error(e: tiberius::error::Error) -> WarehouseError {
    WarehouseError::Query(e.to_string())
}

impl MssqlWarehouse {
    /// Open a connection. Fails fast; there is no retry.
    pub fn connect(
        credentials: &Credentials,
        settings: &WarehouseSettings,
    ) -> Result<Self, WarehouseError> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let server = credentials.server.to_string();

        let mut config = Config::new();
        config.host(&credentials.server.host);
        config.port(credentials.server.port);
        config.database(&credentials.database);
        config.authentication(AuthMethod::sql_server(
            &credentials.username,
            &credentials.password,
        ));
        config.encryption(if settings.encrypt {
            EncryptionLevel::Required
        } else {
            EncryptionLevel::Off
        });
        if settings.trust_server_certificate {
            config.trust_cert();
        }

        let connect_error = |message: String| WarehouseError::Connect {
            server: server.clone(),
            message,
        };
        let client = runtime.block_on(async {
            let tcp = TcpStream::connect(config.get_addr())
                .await
                .map_err(|e| connect_error(e.to_string()))?;
            tcp.set_nodelay(true)
                .map_err(|e| connect_error(e.to_string()))?;
            Client::connect(config, tcp.compat_write())
                .await
                .map_err(|e| connect_error(e.to_string()))
        })?;

        tracing::info!(
            server = %server,
            database = %credentials.database,
            encrypt = settings.encrypt,
            "connected to warehouse"
        );
        Ok(Self {
            runtime,
            client: Some(client),
            server,
        })
    }

    /// Release the connection.
    pub fn close(mut self) -> Result<(), WarehouseError> {
        if let Some(client) = self.client.take() {
            self.runtime.block_on(client.close()).map_err(query_error)?;
            tracing::info!(server = %self.server, "closed warehouse connection");
        }
        Ok(())
    }
}

impl Warehouse for MssqlWarehouse {
    fn query(&mut self, sql: &str, params: &[SqlParam]) -> Result<Table, WarehouseError> {
        let client = self.client.as_mut().ok_or(WarehouseError::Closed)?;
        let bound: Vec<&dyn ToSql> = params
            .iter()
            .map(|p| match p {
                SqlParam::Text(s) => s as &dyn ToSql,
                SqlParam::Date(d) => d as &dyn ToSql,
                SqlParam::Int(i) => i as &dyn ToSql,
            })
            .collect();

        self.runtime.block_on(async {
            let mut stream = client.query(sql, &bound).await.map_err(query_error)?;
            let columns: Vec<String> = stream
                .columns()
                .await
                .map_err(query_error)?
                .map(|cols| cols.iter().map(|c| c.name().to_string()).collect())
                .unwrap_or_default();
            let rows = stream.into_first_result().await.map_err(query_error)?;

            let mut table = Table::new(columns);
            table.rows = rows
                .into_iter()
                .map(|row| row.into_iter().map(|data| to_cell(&data)).collect())
                .collect();
            Ok(table)
        })
    }
}

fn to_cell(data: &ColumnData<'static>) -> Cell {
    match data {
        ColumnData::U8(v) => v.map_or(Cell::Null, |x| Cell::Int(x as i64)),
        ColumnData::I16(v) => v.map_or(Cell::Null, |x| Cell::Int(x as i64)),
        ColumnData::I32(v) => v.map_or(Cell::Null, |x| Cell::Int(x as i64)),
        ColumnData::I64(v) => v.map_or(Cell::Null, Cell::Int),
        ColumnData::F32(v) => v.map_or(Cell::Null, |x| Cell::Float(x as f64)),
        ColumnData::F64(v) => v.map_or(Cell::Null, Cell::Float),
        ColumnData::Bit(v) => v.map_or(Cell::Null, Cell::Bool),
        ColumnData::String(v) => v
            .as_ref()
            .map_or(Cell::Null, |s| Cell::Text(s.to_string())),
        ColumnData::Guid(v) => v.map_or(Cell::Null, |g| Cell::Text(g.to_string())),
        ColumnData::Numeric(v) => v.map_or(Cell::Null, |n| {
            Cell::Float(n.value() as f64 / 10f64.powi(n.scale() as i32))
        }),
        ColumnData::Date(_) => NaiveDate::from_sql(data)
            .ok()
            .flatten()
            .map_or(Cell::Null, Cell::Date),
        ColumnData::DateTime(_) | ColumnData::SmallDateTime(_) | ColumnData::DateTime2(_) => {
            NaiveDateTime::from_sql(data)
                .ok()
                .flatten()
                .map_or(Cell::Null, Cell::DateTime)
        }
        ColumnData::DateTimeOffset(_) => chrono::DateTime::<Utc>::from_sql(data)
            .ok()
            .flatten()
            .map_or(Cell::Null, |d| Cell::DateTime(d.naive_utc())),
        ColumnData::Time(_) => NaiveTime::from_sql(data)
            .ok()
            .flatten()
            .map_or(Cell::Null, |t| Cell::Text(t.to_string())),
        ColumnData::Binary(v) => v
            .as_ref()
            .map_or(Cell::Null, |b| Cell::Text(format!("<{} bytes>", b.len()))),
        ColumnData::Xml(v) => v
            .as_ref()
            .map_or(Cell::Null, |x| Cell::Text(format!("{x:?}"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::borrow::Cow;

    #[test]
    fn scalar_cells() {
        assert_eq!(to_cell(&ColumnData::I32(Some(7))), Cell::Int(7));
        assert_eq!(to_cell(&ColumnData::F64(None)), Cell::Null);
        assert_eq!(
            to_cell(&ColumnData::String(Some(Cow::Borrowed("FPT")))),
            Cell::Text("FPT".into())
        );
        assert_eq!(to_cell(&ColumnData::Bit(Some(true))), Cell::Bool(true));
    }
}
