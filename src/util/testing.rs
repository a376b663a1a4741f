use std::env;
use std::sync::Once;
use tracing::{debug, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    prelude::*,
    EnvFilter,
};

use crate::domain::{Entity, EntityBuilder, EntityId, EntityKind, NodeData};

static TEST_SETUP: Once = Once::new();

pub fn init_test_setup() {
    TEST_SETUP.call_once(|| {
        if env::var("RUST_LOG").is_err() {
            env::set_var("RUST_LOG", "debug");
        }
        // global logging subscriber, used by all tracing log macros
        setup_test_logging();
        info!("Test Setup complete");
    });
}

fn setup_test_logging() {
    debug!("INIT: Attempting logger init from testing.rs");
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let subscriber = tracing_subscriber::registry().with(
        fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(true)
            .with_thread_names(true)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(env_filter),
    );

    // Only set if we haven't already set a global subscriber
    if tracing::dispatcher::has_been_set() {
        debug!("Tracing subscriber already set");
    } else {
        subscriber.try_init().unwrap_or_else(|e| {
            eprintln!("Error: Failed to set up logging: {}", e);
        });
    }
}

/// Unbranched entity with one node per point, `z = 0`, identity transform.
pub fn chain_entity(id: u64, kind: EntityKind, points: &[(f64, f64)]) -> Entity {
    EntityBuilder::new(EntityId(id), kind)
        .title(format!("{} {}", kind.type_name(), id))
        .chain(points.iter().map(|&(x, y)| NodeData::new(x, y, 0.0)))
        .build()
        .expect("chain entity is always a valid tree")
}

/// Unbranched treeline whose nodes carry the given tag labels.
pub fn entity_with_tags(id: u64, nodes: &[((f64, f64), &[&str])]) -> Entity {
    EntityBuilder::new(EntityId(id), EntityKind::Treeline)
        .title(format!("tagged {}", id))
        .chain(
            nodes
                .iter()
                .map(|&((x, y), tags)| NodeData::new(x, y, 0.0).with_tags(tags.iter().copied())),
        )
        .build()
        .expect("chain entity is always a valid tree")
}
