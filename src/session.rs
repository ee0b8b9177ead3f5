//! # Session
//!
//! One open document wired end to end: the forest, its settings and view,
//! the engine and the scheduler. Hosts that do not need to split these up
//! drive everything through a `Session`: apply edits, call [`Session::tick`]
//! from the event loop and read coordinates back from [`Session::forest`].

use std::sync::Arc;
use std::time::Duration;

use crate::clock::Clock;
use crate::error::LayoutError;
use crate::layout::{LayoutApplied, LayoutContext, LayoutEngine, Viewport};
use crate::model::{Forest, NodeId, Settings};
use crate::scheduler::{LayoutRequest, LayoutScheduler, ScheduleMode};

pub struct Session {
    forest: Forest,
    settings: Settings,
    context: LayoutContext,
    engine: LayoutEngine,
    scheduler: LayoutScheduler,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("roots", &self.forest.roots.len())
            .field("context", &self.context)
            .field("scheduler", &self.scheduler)
            .finish()
    }
}

impl Session {
    /// Build the engine from `settings` (fonts, cache bounds, debounce).
    pub fn new(forest: Forest, settings: Settings, clock: Arc<dyn Clock>) -> Result<Self, LayoutError> {
        let engine = LayoutEngine::from_settings(&settings, Arc::clone(&clock))?;
        let scheduler = LayoutScheduler::new(clock, Duration::from_millis(settings.debounce_ms));
        Ok(Self {
            forest,
            settings,
            context: LayoutContext::default(),
            engine,
            scheduler,
        })
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn viewport(&self) -> Viewport {
        self.context.viewport
    }

    pub fn set_viewport(&mut self, viewport: Viewport) {
        self.context.viewport = viewport;
    }

    pub fn engine(&self) -> &LayoutEngine {
        &self.engine
    }

    pub fn scheduler(&self) -> &LayoutScheduler {
        &self.scheduler
    }

    /// Replace the settings and schedule a debounced pass.
    ///
    /// Editing state and wrap changes are picked up by the size fingerprint.
    /// New fonts or cache bounds rebuild the engine's measurer and caches, and
    /// a new debounce window applies from this request on. If the fonts fail
    /// to load nothing changes.
    pub fn update_settings(&mut self, settings: Settings) -> Result<(), LayoutError> {
        if settings.fonts != self.settings.fonts || settings.cache != self.settings.cache {
            self.engine.reconfigure(&settings)?;
        }
        if settings.debounce_ms != self.settings.debounce_ms {
            self.scheduler
                .set_debounce(Duration::from_millis(settings.debounce_ms));
        }
        self.settings = settings;
        self.scheduler.request_debounced(LayoutRequest::default());
        Ok(())
    }

    /// Apply `edit` to the forest and schedule a pass. `anchor` names the
    /// node that should stay put on screen. Returns the pass result when the
    /// mode ran one right away.
    pub fn edit<R>(
        &mut self,
        mode: ScheduleMode,
        anchor: Option<NodeId>,
        edit: impl FnOnce(&mut Forest) -> R,
    ) -> (R, Option<Result<LayoutApplied, LayoutError>>) {
        let out = edit(&mut self.forest);
        // The edit may have restructured anything.
        self.engine.notify_structure_changed();
        let request = LayoutRequest { anchor };
        let applied = match mode {
            ScheduleMode::Debounced => {
                self.scheduler.request_debounced(request);
                None
            }
            ScheduleMode::Immediate => Some(self.run(request)),
        };
        (out, applied)
    }

    /// Run the pending pass if its deadline has passed.
    pub fn tick(&mut self) -> Option<Result<LayoutApplied, LayoutError>> {
        let Self {
            forest,
            settings,
            context,
            engine,
            scheduler,
        } = self;
        scheduler.poll(|request| Self::pass(engine, forest, settings, context, request))
    }

    /// Lay out now, absorbing anything pending.
    pub fn layout_now(&mut self) -> Result<LayoutApplied, LayoutError> {
        self.run(LayoutRequest::default())
    }

    /// Open another document: caches are dropped and the new forest is laid
    /// out immediately.
    pub fn switch_document(&mut self, forest: Forest) -> Result<LayoutApplied, LayoutError> {
        self.scheduler.cancel();
        self.context.pending_anchor = None;
        self.engine.clear_caches();
        self.forest = forest;
        self.layout_now()
    }

    fn run(&mut self, request: LayoutRequest) -> Result<LayoutApplied, LayoutError> {
        let Self {
            forest,
            settings,
            context,
            engine,
            scheduler,
        } = self;
        scheduler.run_immediate(request, |request| {
            Self::pass(engine, forest, settings, context, request)
        })
    }

    fn pass(
        engine: &LayoutEngine,
        forest: &mut Forest,
        settings: &Settings,
        context: &mut LayoutContext,
        request: LayoutRequest,
    ) -> Result<LayoutApplied, LayoutError> {
        if let Some(anchor) = request.anchor {
            context.pending_anchor = Some(anchor);
        }
        engine.layout(forest, settings, context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::model::{FontEntry, Node};

    fn session() -> (Arc<ManualClock>, Session) {
        let clock = Arc::new(ManualClock::new());
        let forest = Forest::new(vec![
            Node::new("a", "A").with_children(vec![Node::new("a1", "a1")]),
            Node::new("b", "B"),
        ]);
        let session = Session::new(forest, Settings::default(), clock.clone()).unwrap();
        (clock, session)
    }

    #[test]
    fn debounced_edit_runs_on_tick_after_window() {
        let (clock, mut s) = session();
        s.layout_now().unwrap();
        let (_, applied) = s.edit(ScheduleMode::Debounced, None, |f| {
            f.find_mut("a").unwrap().children.push(Node::new("a2", "a2"));
        });
        assert!(applied.is_none());
        assert!(s.tick().is_none());
        clock.advance(Duration::from_millis(50));
        let applied = s.tick().unwrap().unwrap();
        assert_eq!(applied.nodes, 4);
    }

    #[test]
    fn immediate_edit_applies_anchor() {
        let (_, mut s) = session();
        s.layout_now().unwrap();
        let (_, applied) = s.edit(ScheduleMode::Immediate, Some("b".to_string()), |f| {
            f.find_mut("a").unwrap().children.push(Node::new("a2", "a2"));
        });
        let applied = applied.unwrap().unwrap();
        let (_, dy) = applied.anchor_shift.unwrap();
        assert!(dy > 0.0);
        assert_eq!(s.viewport().pan_y, dy);
    }

    #[test]
    fn update_settings_applies_new_debounce_window() {
        let (clock, mut s) = session();
        s.layout_now().unwrap();
        s.update_settings(Settings {
            debounce_ms: 200,
            ..Settings::default()
        })
        .unwrap();
        assert_eq!(s.scheduler().debounce(), Duration::from_millis(200));
        clock.advance(Duration::from_millis(50));
        assert!(s.tick().is_none());
        clock.advance(Duration::from_millis(150));
        assert!(s.tick().unwrap().is_ok());
    }

    #[test]
    fn update_settings_rebuilds_caches_on_new_bounds() {
        let (_, mut s) = session();
        s.layout_now().unwrap();
        assert!(s.engine().cache_stats().sizes.size > 0);
        let mut settings = Settings::default();
        settings.cache.size_capacity = 8;
        s.update_settings(settings).unwrap();
        let stats = s.engine().cache_stats();
        assert_eq!(stats.sizes.size, 0);
        assert_eq!(stats.sizes.capacity, 8);
    }

    #[test]
    fn update_settings_with_bad_font_keeps_old_settings() {
        let (_, mut s) = session();
        let mut settings = Settings::default();
        settings.debounce_ms = 500;
        settings.fonts.push(FontEntry {
            family: "Broken".to_string(),
            src: "not base64 at all!".to_string(),
            weight: 400,
            italic: false,
        });
        assert!(s.update_settings(settings).is_err());
        assert!(s.settings().fonts.is_empty());
        assert_eq!(s.scheduler().debounce(), Duration::from_millis(50));
    }

    #[test]
    fn switch_document_clears_pending_work() {
        let (clock, mut s) = session();
        s.edit(ScheduleMode::Debounced, Some("a".to_string()), |_| ());
        let applied = s
            .switch_document(Forest::new(vec![Node::new("z", "Z")]))
            .unwrap();
        assert_eq!(applied.roots, 1);
        assert!(applied.anchor_shift.is_none());
        clock.advance(Duration::from_secs(1));
        assert!(s.tick().is_none());
    }
}
