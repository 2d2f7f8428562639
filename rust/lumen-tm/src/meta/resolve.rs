//! Handler lookup for (value, event), with the per-map absence cache.

use tracing::trace;

use super::event::{Event, Registry};
use crate::value::{LStr, OverrideMap, Value};
use crate::vm::VM;

/// Look `name` up in `map`, recording a miss in the map's absence cache.
/// Only cacheable events may be resolved this way.
pub fn resolve_cached(map: &OverrideMap, event: Event, name: &LStr) -> Option<Value> {
    debug_assert!(event.is_cacheable(), "{} is not cacheable", event);
    let handler = map.get_short_str(name);
    if handler.is_none() {
        map.mark_absent(event.ordinal());
        trace!(%event, "handler absence cached");
    }
    handler
}

/// Cached lookup that skips the map entirely once the event is known to be
/// absent. A handler bound after the miss is not seen here.
pub fn fast_resolve(map: Option<&OverrideMap>, event: Event, registry: &Registry) -> Option<Value> {
    let map = map?;
    if map.is_marked_absent(event.ordinal()) {
        return None;
    }
    resolve_cached(map, event, registry.event_name(event))
}

/// Uncached lookup on the override map attached to `value`. Kinds that
/// cannot carry a map resolve to `None` without touching any map.
pub fn resolve_by_value(value: &Value, event: Event, registry: &Registry) -> Option<Value> {
    if !value.kind().carries_overrides() {
        return None;
    }
    value.overrides()?.get_short_str(registry.event_name(event))
}

impl VM {
    /// Cacheable-event lookup honoring the `absence_cache` setting.
    pub fn fast_tm(&self, map: Option<&OverrideMap>, event: Event) -> Option<Value> {
        if self.config().absence_cache {
            fast_resolve(map, event, self.registry())
        } else {
            map?.get_short_str(self.registry().event_name(event))
        }
    }

    pub fn tm_by_value(&self, value: &Value, event: Event) -> Option<Value> {
        resolve_by_value(value, event, self.registry())
    }
}
