//! # Stockroom Client
//!
//! Async plumbing that keeps Stockroom tables live: a REST [`Gateway`], a
//! shared [`RealtimeChannel`] with a publish/subscribe registry, and the
//! [`LiveTable`] store unit that applies both to a
//! [`stockroom_engine::LiveList`].
//!
//! ```no_run
//! use stockroom_client::{Config, Gateway, LiveTable, RealtimeChannel, TableOptions};
//! use stockroom_engine::EntityKind;
//!
//! # async fn run() -> stockroom_client::Result<()> {
//! let config = Config::from_env()?;
//! let channel = RealtimeChannel::connect(&config.ws_url).await?;
//!
//! let options = TableOptions::from_config(EntityKind::DocsWarehouse, &config);
//! let mut table = LiveTable::new(Gateway::from_config(&config), options);
//! table.attach(channel.subscribe(EntityKind::DocsWarehouse));
//! table.refresh().await?;
//!
//! while let Some(summary) = table.next_change().await {
//!     println!("{} rows, {:?}", table.records().len(), summary);
//! }
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod gateway;
pub mod notice;
pub mod realtime;
pub mod table;

pub use config::{Config, ConfigError};
pub use error::{ClientError, Result};
pub use gateway::{Gateway, ListPage};
pub use notice::{Notice, NoticeLevel};
pub use realtime::{RealtimeChannel, SubscriberRegistry, Subscription};
pub use table::{LiveTable, TableOptions, NO_CHANGES_MESSAGE};
