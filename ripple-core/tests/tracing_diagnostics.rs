//! Development diagnostics are logged through `tracing`.

use std::sync::{Arc, Mutex};

use ripple_core::{readonly, Observed, Target};
use tracing::Subscriber;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

#[derive(Default)]
struct Captured {
    warnings: Vec<(String, String)>,
}

struct Capture {
    state: Arc<Mutex<Captured>>,
}

impl<S> Layer<S> for Capture
where
    S: Subscriber + for<'lookup> tracing_subscriber::registry::LookupSpan<'lookup>,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        if *event.metadata().level() != tracing::Level::WARN {
            return;
        }
        struct Fields {
            error: Option<String>,
        }
        impl tracing::field::Visit for Fields {
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "error" {
                    self.error = Some(format!("{value:?}"));
                }
            }
        }
        let mut fields = Fields { error: None };
        event.record(&mut fields);
        self.state.lock().expect("capture lock").warnings.push((
            event.metadata().target().to_string(),
            fields.error.unwrap_or_default(),
        ));
    }
}

fn observed(value: ripple_core::Value) -> Observed {
    value.into_observed().expect("observed view")
}

#[test]
fn readonly_write_is_logged_under_reactivity_target() {
    let state = Arc::new(Mutex::new(Captured::default()));
    let subscriber = tracing_subscriber::registry().with(Capture {
        state: Arc::clone(&state),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let ro = observed(readonly(Target::record([("count", 0)])));
    assert!(!ro.set("count", 1));

    let captured = state.lock().expect("capture lock");
    if cfg!(debug_assertions) {
        assert_eq!(captured.warnings.len(), 1);
        let (target, error) = &captured.warnings[0];
        assert_eq!(target, "ripple::reactivity");
        assert!(error.contains("count"), "unexpected message {error}");
    } else {
        assert!(captured.warnings.is_empty());
    }
}

#[test]
fn valid_operations_log_no_warnings() {
    let state = Arc::new(Mutex::new(Captured::default()));
    let subscriber = tracing_subscriber::registry().with(Capture {
        state: Arc::clone(&state),
    });
    let _guard = tracing::subscriber::set_default(subscriber);

    let map = observed(ripple_core::reactive(Target::map([("a", 1)])));
    map.set("a", 2);
    map.delete("a");
    assert!(state.lock().expect("capture lock").warnings.is_empty());
}
