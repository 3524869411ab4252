//! Built-in platform globals: clock hour, viewport width, operating system.
//!
//! These cover the common environment inputs of localized strings: greeting
//! by time of day (`@hour`), width-dependent wording (`@screen.width.px`),
//! and OS-specific terminology (`@os`). The engine itself has no event
//! loop; the embedder owns the actual timers and resize sources and reports
//! changes through [`Context::handle_global_change`](crate::Context::handle_global_change).

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;

use chrono::Timelike;

use crate::global::{Global, GlobalError, GlobalRegistry};
use crate::types::Data;

/// The registry a [`Context`](crate::Context) uses unless given another
/// one: `hour`, `screen`, and `os`.
pub fn default_globals() -> GlobalRegistry {
    let mut registry = GlobalRegistry::new();
    registry.register(Box::new(HourGlobal::new()));
    registry.register(Box::new(ScreenGlobal::new(0)));
    registry.register(Box::new(OsGlobal));
    registry
}

/// `@hour` — the current local hour (0–23).
///
/// Dynamic: while active the value is cached and recomputed on
/// [`Global::refresh`]. The embedder should run a timer aligned to the next
/// hour boundary and call `handle_global_change("hour")` when it fires.
pub struct HourGlobal {
    cached: Option<u32>,
    active: bool,
}

impl HourGlobal {
    pub fn new() -> Self {
        HourGlobal {
            cached: None,
            active: false,
        }
    }

    fn current() -> u32 {
        chrono::Local::now().hour()
    }
}

impl Default for HourGlobal {
    fn default() -> Self {
        HourGlobal::new()
    }
}

impl Global for HourGlobal {
    fn id(&self) -> &str {
        "hour"
    }

    fn value(&mut self) -> Result<Data, GlobalError> {
        if self.active
            && let Some(hour) = self.cached
        {
            return Ok(Data::from(hour));
        }
        let hour = HourGlobal::current();
        if self.active {
            self.cached = Some(hour);
        }
        Ok(Data::from(hour))
    }

    fn is_dynamic(&self) -> bool {
        true
    }

    fn activate(&mut self) {
        self.active = true;
        self.cached = Some(HourGlobal::current());
    }

    fn deactivate(&mut self) {
        self.active = false;
        self.cached = None;
    }

    fn refresh(&mut self) {
        if self.active {
            self.cached = Some(HourGlobal::current());
        }
    }
}

/// `@screen` — the viewport, exposed as `{ width: { px } }` so expressions
/// read `@screen.width.px`.
///
/// The width lives in a shared cell: keep a [`ScreenHandle`] on the embedder
/// side, update it from the platform's resize source, then call
/// `handle_global_change("screen")`.
pub struct ScreenGlobal {
    width: Rc<Cell<u32>>,
}

/// Embedder-side handle to a [`ScreenGlobal`]'s width.
#[derive(Clone)]
pub struct ScreenHandle {
    width: Rc<Cell<u32>>,
}

impl ScreenHandle {
    pub fn set_width(&self, px: u32) {
        self.width.set(px);
    }
}

impl ScreenGlobal {
    pub fn new(initial_px: u32) -> Self {
        ScreenGlobal {
            width: Rc::new(Cell::new(initial_px)),
        }
    }

    /// Take a handle before registering the global.
    pub fn handle(&self) -> ScreenHandle {
        ScreenHandle {
            width: self.width.clone(),
        }
    }
}

impl Global for ScreenGlobal {
    fn id(&self) -> &str {
        "screen"
    }

    fn value(&mut self) -> Result<Data, GlobalError> {
        let mut width = BTreeMap::new();
        width.insert("px".to_string(), Data::from(self.width.get()));
        let mut screen = BTreeMap::new();
        screen.insert("width".to_string(), Data::Map(width));
        Ok(Data::Map(screen))
    }

    fn is_dynamic(&self) -> bool {
        true
    }
}

/// `@os` — the host operating system: "mac", "linux", "win", or "unknown".
///
/// Static: no change source.
pub struct OsGlobal;

impl Global for OsGlobal {
    fn id(&self) -> &str {
        "os"
    }

    fn value(&mut self) -> Result<Data, GlobalError> {
        Ok(Data::from(os_name()))
    }
}

fn os_name() -> &'static str {
    match std::env::consts::OS {
        "macos" => "mac",
        "linux" => "linux",
        "windows" => "win",
        _ => "unknown",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_reports_nested_width() {
        let mut screen = ScreenGlobal::new(800);
        let handle = screen.handle();
        let value = screen.value().unwrap();
        assert_eq!(
            value.get("width").and_then(|w| w.get("px")).and_then(Data::as_num),
            Some(800.0)
        );
        handle.set_width(1280);
        let value = screen.value().unwrap();
        assert_eq!(
            value.get("width").and_then(|w| w.get("px")).and_then(Data::as_num),
            Some(1280.0)
        );
    }

    #[test]
    fn os_is_one_of_the_known_names() {
        let mut os = OsGlobal;
        let name = os.value().unwrap();
        let name = name.as_str().unwrap().to_string();
        assert!(["mac", "linux", "win", "unknown"].contains(&name.as_str()));
        assert!(!os.is_dynamic());
    }

    #[test]
    fn hour_caches_only_while_active() {
        let mut hour = HourGlobal::new();
        assert!(hour.value().is_ok());
        assert!(hour.cached.is_none());
        hour.activate();
        assert!(hour.cached.is_some());
        hour.deactivate();
        assert!(hour.cached.is_none());
    }
}
