/*!
# Overview

[bgp-listener][crate] watches the public [RIPE RIS Live](https://ris-live.ripe.net) BGP update
stream for a set of monitored ASNs and prefixes and pushes a human-readable alert to a webhook
for every matching announcement or withdrawal.

The pipeline is linear and runs one frame at a time:

1. [StreamClient] connects to the stream, subscribes to the configured collectors and reconnects
   with a fixed delay whenever the connection ends;
2. [match_update] checks every decoded [RawUpdate] against the [Watchlist];
3. [Dispatcher] formats every [MatchEvent] and delivers it with bounded retries.

A [StatsReporter] runs beside the pipeline and periodically logs the shared [Counters].

# Example

```no_run
use bgp_listener::*;
use std::sync::Arc;

# async fn run() -> Result<(), ListenerError> {
let config = ListenerConfig::load(None)?;
let counters = Arc::new(Counters::new(&config.ris_collectors));

let dispatcher = Dispatcher::new(WebhookSink::from_env()?, config.retry_policy(), counters.clone());
let mut client = StreamClient::new(
    RisLiveConnector,
    dispatcher,
    Arc::new(config.watchlist()),
    counters.clone(),
)
.endpoint(&config.stream_url)
.collectors(&config.ris_collectors)
.reconnect_policy(config.reconnect_policy());

let reporter = StatsReporter::start(counters, config.stats_interval());
let res = client.run().await;
reporter.stop().await;
res
# }
```

# Matching rules

- only `UPDATE` messages are considered;
- a message matches when any ASN on its AS path is monitored, or when a prefix equals or is more
  specific than a monitored prefix;
- every matching withdrawn prefix produces one withdrawal event, and the announced prefix produces
  at most one announcement event carrying every match reason.
*/

pub mod config;
mod error;
pub mod matcher;
pub mod notifier;
pub mod stats;
pub mod stream;
pub mod update;
pub mod watchlist;

pub use config::ListenerConfig;
pub use error::ListenerError;
pub use matcher::{match_update, MatchEvent, MatchKind};
pub use notifier::{
    format_event, webhook_url_from_env, DeliveryOutcome, Dispatcher, NotificationSink,
    RetryPolicy, WebhookSink,
};
pub use stats::{Counters, StatsReporter, StatsSnapshot};
pub use stream::{
    listen, ConnectionState, ReconnectPolicy, RisLiveConnector, StreamClient, StreamConnection,
    StreamConnector, StreamState, DEFAULT_RIS_LIVE_URL,
};
pub use update::{RawUpdate, StreamFrame, SubscribeRequest};
pub use watchlist::{normalize_prefix, Watchlist};
