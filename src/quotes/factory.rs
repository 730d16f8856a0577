//! Builds one quote source per configured venue

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use crate::{
    config::{Config, VenueKind},
    errors::{BotError, BotResult},
    types::{NetworkId, VenueId},
    ConcreteProvider,
};
use super::{HttpQuoteSource, QuoteSource, ReservePoolSource};

pub type QuoteSources = HashMap<VenueId, Arc<dyn QuoteSource>>;

pub fn build_quote_sources(
    config: &Config,
    providers: &HashMap<NetworkId, Arc<ConcreteProvider>>,
) -> BotResult<QuoteSources> {
    let mut sources: QuoteSources = HashMap::new();
    let timeout = Duration::from_millis(config.scanner.quote_timeout_ms);

    for venue in &config.venues {
        let source: Arc<dyn QuoteSource> = match &venue.kind {
            VenueKind::ReservePool { factory } => {
                let provider = providers.get(&venue.network).ok_or_else(|| BotError::UnknownNetwork {
                    network: venue.network.clone(),
                    referenced_by: format!("venue '{}'", venue.id),
                })?;
                Arc::new(ReservePoolSource::new(venue.id.clone(), provider.clone(), *factory, venue.fee_bps))
            }
            VenueKind::HttpQuote { endpoint, router } => {
                Arc::new(HttpQuoteSource::new(venue.id.clone(), endpoint.clone(), *router, timeout)?)
            }
        };
        sources.insert(venue.id.clone(), source);
    }
    Ok(sources)
}
