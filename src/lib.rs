pub mod cli;
pub mod core;
pub mod mcp;
pub mod providers;
pub mod service;
pub mod store;

use crate::core::analytics::{ComparePeriod, ConversionPolicy};
use crate::core::calendar::{DateResolver, parse_date};
use crate::core::config::{AppConfig, Transport};
use crate::core::rates::RateKind;
use crate::providers::{RetryPolicy, TcmbClient};
use crate::service::RateService;
use crate::store::KeyValueStore;
use crate::store::rates::RateCache;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub enum AppCommand {
    Serve {
        transport: Option<Transport>,
    },
    Rates {
        date: Option<String>,
        currencies: Vec<String>,
    },
    Currencies,
    Convert {
        amount: Decimal,
        from: String,
        to: String,
        date: Option<String>,
        rate_type: Option<String>,
    },
    History {
        currency: String,
        start: String,
        end: String,
        rate_type: Option<String>,
    },
    Compare {
        currencies: Vec<String>,
        date: Option<String>,
        start: Option<String>,
        end: Option<String>,
        days: Option<i64>,
    },
    CacheList,
    CacheClear,
}

/// Opens the cache, builds the feed client and wires them into a service.
pub fn build_service(config: &AppConfig) -> Result<RateService> {
    let cache = if config.cache.enabled {
        let path = config.cache_path()?;
        debug!("Opening rate cache at {}", path.display());
        let store = KeyValueStore::open(&path);
        RateCache::from_store(&store, config.ttl_today(), config.ttl_historical())
    } else {
        info!("Rate cache disabled by configuration");
        RateCache::disabled()
    };

    let retry_delay = Duration::try_from_secs_f64(config.feed.retry_delay)
        .with_context(|| format!("Invalid retry delay: {}", config.feed.retry_delay))?;
    let retry = RetryPolicy::new(config.feed.max_retries, retry_delay);
    let request_delay = Duration::try_from_secs_f64(config.feed.request_delay)
        .with_context(|| format!("Invalid request delay: {}", config.feed.request_delay))?;
    let client = TcmbClient::new(
        &config.feed.base_url,
        Duration::from_secs(config.feed.timeout),
        retry,
    )?
    .with_request_delay(request_delay);

    Ok(RateService::new(
        DateResolver::default(),
        cache,
        Arc::new(client),
        config.feed.max_concurrent_fetches,
    ))
}

pub async fn run_command(command: AppCommand, config: &AppConfig) -> Result<()> {
    let service = build_service(config)?;
    let policy = ConversionPolicy::from(&config.conversion);
    let today = service.today();

    match command {
        AppCommand::Serve { transport } => {
            let server = Arc::new(mcp::McpServer::new(Arc::new(service), policy));
            match transport.unwrap_or(config.server.transport) {
                Transport::Stdio => mcp::serve_stdio(server).await,
                Transport::Tcp => {
                    mcp::serve_tcp(server, &config.server.host, config.server.port).await
                }
            }
        }
        AppCommand::Rates { date, currencies } => {
            let date = date.map(|d| parse_date(&d, today)).transpose()?;
            cli::rates::show_rates(&service, date, &currencies).await
        }
        AppCommand::Currencies => cli::rates::show_currencies(&service).await,
        AppCommand::Convert {
            amount,
            from,
            to,
            date,
            rate_type,
        } => {
            let policy = match rate_type {
                Some(rate_type) => ConversionPolicy::uniform(rate_type.parse()?),
                None => policy,
            };
            let date = date.map(|d| parse_date(&d, today)).transpose()?;
            cli::analytics::convert(&service, policy, amount, &from, &to, date).await
        }
        AppCommand::History {
            currency,
            start,
            end,
            rate_type,
        } => {
            let kind = match rate_type {
                Some(rate_type) => rate_type.parse()?,
                None => RateKind::ForexSelling,
            };
            let start = parse_date(&start, today)?;
            let end = parse_date(&end, today)?;
            cli::analytics::history(&service, &currency, kind, start, end).await
        }
        AppCommand::Compare {
            currencies,
            date,
            start,
            end,
            days,
        } => {
            let parse = |value: Option<String>| value.map(|v| parse_date(&v, today)).transpose();
            let period = ComparePeriod::from_args(
                parse(date)?,
                parse(start)?,
                parse(end)?,
                days,
                today,
            )?;
            let codes: Vec<String> = currencies.iter().map(|c| c.to_uppercase()).collect();
            cli::analytics::compare(&service, &codes, period).await
        }
        AppCommand::CacheList => cli::cache::list(service.cache()).await,
        AppCommand::CacheClear => cli::cache::clear(service.cache()).await,
    }
}
