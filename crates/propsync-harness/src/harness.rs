#![forbid(unsafe_code)]

//! Mount, tick and destroy host components against a live runtime.
//!
//! # Usage
//!
//! ```ignore
//! let mut harness = Harness::new();
//! let parent = PropSyncParent::new(harness.runtime());
//! let root = harness.mount(parent)?;
//!
//! harness.click(root, "#setParentPropButton")?;
//! harness.next_tick()?;
//! assert_eq!(harness.element_text(root, "#parentProp").as_deref(), Some("changedValue"));
//! ```

use std::rc::Rc;

use ahash::AHashMap;
use propsync_runtime::{ComponentId, Props, Runtime, SyncConfig, SyncError, TickReport};
use thiserror::Error;
use tracing::debug;

use crate::renderer::TextRenderer;
use crate::view::{Component, Element, EventCx, RenderCx};

/// Harness settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessConfig {
    /// Upper bound on ticks [`Harness::settle`] runs before giving up.
    pub max_settle_ticks: usize,
    /// Config for the runtime the harness creates.
    pub sync: SyncConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            max_settle_ticks: 16,
            sync: SyncConfig::default(),
        }
    }
}

impl HarnessConfig {
    #[must_use]
    pub fn with_max_settle_ticks(mut self, ticks: usize) -> Self {
        self.max_settle_ticks = ticks.max(1);
        self
    }

    #[must_use]
    pub fn with_sync_config(mut self, sync: SyncConfig) -> Self {
        self.sync = sync;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum HarnessError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("no element matches `{0}`")]
    NoSuchElement(String),

    #[error("runtime still busy after {ticks} ticks")]
    Unsettled { ticks: usize },
}

pub type HarnessResult<T> = std::result::Result<T, HarnessError>;

/// Drives host components through their lifecycle.
pub struct Harness {
    runtime: Runtime,
    renderer: TextRenderer,
    components: AHashMap<ComponentId, Rc<dyn Component>>,
    config: HarnessConfig,
}

impl std::fmt::Debug for Harness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Harness")
            .field("runtime", &self.runtime)
            .field("mounted", &self.components.len())
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(HarnessConfig::default())
    }

    #[must_use]
    pub fn with_config(config: HarnessConfig) -> Self {
        let renderer = TextRenderer::new();
        let runtime = Runtime::with_scheduler(config.sync.clone(), Rc::new(renderer.clone()));
        Self {
            runtime,
            renderer,
            components: AHashMap::new(),
            config,
        }
    }

    #[must_use]
    pub fn runtime(&self) -> &Runtime {
        &self.runtime
    }

    #[must_use]
    pub fn renderer(&self) -> &TextRenderer {
        &self.renderer
    }

    #[must_use]
    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Mount a root component and, recursively, the children it declares.
    /// Every mounted component is rendered once.
    pub fn mount(&mut self, component: impl Component + 'static) -> HarnessResult<ComponentId> {
        self.mount_rc(Rc::new(component), None, Props::new())
    }

    /// Mount a component under `parent` with explicit prop sources.
    pub fn mount_child(
        &mut self,
        parent: ComponentId,
        component: impl Component + 'static,
        props: Props,
    ) -> HarnessResult<ComponentId> {
        self.mount_rc(Rc::new(component), Some(parent), props)
    }

    fn mount_rc(
        &mut self,
        component: Rc<dyn Component>,
        parent: Option<ComponentId>,
        props: Props,
    ) -> HarnessResult<ComponentId> {
        let definition = component.definition();
        let id = self.runtime.create_component(&definition, parent, props)?;
        self.components.insert(id, Rc::clone(&component));
        self.render(id)?;
        debug!(component = id.get(), name = definition.name(), "mounted");
        for child in component.children() {
            self.mount_rc(child.component, Some(id), child.props)?;
        }
        Ok(id)
    }

    fn render(&self, id: ComponentId) -> HarnessResult<bool> {
        let Some(component) = self.components.get(&id).cloned() else {
            return Ok(false);
        };
        let cx = RenderCx {
            runtime: &self.runtime,
            id,
        };
        let view = self.runtime.track_render(id, || component.render(&cx))?;
        Ok(self.renderer.commit(id, view))
    }

    /// `root` and all its descendants, parent-first.
    pub fn subtree(&self, root: ComponentId) -> HarnessResult<Vec<ComponentId>> {
        let mut out = Vec::new();
        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let children = self.runtime.children(id)?;
            stack.extend(children.into_iter().rev());
            out.push(id);
        }
        Ok(out)
    }

    /// The element matching `selector` (`#id`) in `root`'s subtree.
    #[must_use]
    pub fn element(&self, root: ComponentId, selector: &str) -> Option<Element> {
        self.locate(root, selector).map(|(_, element)| element)
    }

    #[must_use]
    pub fn element_text(&self, root: ComponentId, selector: &str) -> Option<String> {
        self.element(root, selector).map(|element| element.text)
    }

    fn locate(&self, root: ComponentId, selector: &str) -> Option<(ComponentId, Element)> {
        let ids = self.subtree(root).ok()?;
        self.renderer.find(&ids, selector.trim_start_matches('#'))
    }

    /// Dispatch `event` to the component owning the element `selector`.
    pub fn trigger(&self, root: ComponentId, selector: &str, event: &str) -> HarnessResult<()> {
        let (owner, element) = self
            .locate(root, selector)
            .ok_or_else(|| HarnessError::NoSuchElement(selector.to_string()))?;
        let component = self
            .components
            .get(&owner)
            .cloned()
            .ok_or(SyncError::UnknownComponent(owner))?;
        let cx = EventCx {
            runtime: &self.runtime,
            id: owner,
        };
        debug!(component = owner.get(), target = %element.id, event, "event");
        component.on_event(&cx, &element.id, event)?;
        Ok(())
    }

    pub fn click(&self, root: ComponentId, selector: &str) -> HarnessResult<()> {
        self.trigger(root, selector, "click")
    }

    /// Run one runtime tick and re-render whatever it scheduled.
    pub fn next_tick(&mut self) -> HarnessResult<TickReport> {
        let report = self.runtime.tick();
        for id in self.renderer.take_scheduled() {
            self.render(id)?;
        }
        Ok(report)
    }

    /// Tick until the runtime is idle. Returns how many ticks ran.
    pub fn settle(&mut self) -> HarnessResult<usize> {
        for ticks in 1..=self.config.max_settle_ticks {
            self.next_tick()?;
            if self.runtime.is_idle() {
                return Ok(ticks);
            }
        }
        Err(HarnessError::Unsettled {
            ticks: self.config.max_settle_ticks,
        })
    }

    /// Unmount `root` and its subtree.
    pub fn destroy(&mut self, root: ComponentId) -> HarnessResult<()> {
        let removed = self.subtree(root)?;
        self.runtime.destroy_component(root)?;
        for id in removed {
            self.components.remove(&id);
            self.renderer.forget(id);
        }
        Ok(())
    }

    #[must_use]
    pub fn render_count(&self, component: ComponentId) -> usize {
        self.renderer.render_count(component)
    }

    #[must_use]
    pub fn patch_count(&self) -> usize {
        self.renderer.patch_count()
    }

    #[must_use]
    pub fn is_mounted(&self, component: ComponentId) -> bool {
        self.components.contains_key(&component)
    }
}
