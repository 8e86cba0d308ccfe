//! Block controller
//!
//! Owns the lifecycle of every example block on a page. Each block is armed
//! once at page load and runs at most once:
//!
//! ```text
//! armed --activate--> executing --result ready--> executed
//! ```
//!
//! There is no way back to `armed`. The state moves to `executing` and the
//! trigger is removed before the query is awaited, so a block cannot run twice
//! even when activations interleave.

use serde::{Deserialize, Serialize};
use std::cell::{Ref, RefCell};
use std::rc::Rc;

use crate::page::surface::CannedSpacing;
use crate::page::{discover, BlockId, BlockMode, DiscoveredBlock, Page, Surface};
use crate::reader::Reader;
use crate::render::render_result_set;
use crate::{docsqlError, Result};

/// Controller settings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ControllerConfig {
    /// Spacing placed before a revealed canned payload
    pub canned_spacing: CannedSpacing,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockState {
    Armed,
    Executing,
    Executed,
}

/// Outcome of an activation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// The block ran and its output was placed
    Executed,
    /// The block was not armed; nothing happened
    Ignored,
}

/// State record of one example block
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExampleBlock {
    pub id: BlockId,
    pub mode: BlockMode,
    pub state: BlockState,
}

/// Drives the example blocks of one page load
///
/// The engine is created by the caller once per page and handed in; canned-only
/// pages pass `None`. All methods take `&self`, so activations of different
/// blocks may be awaited concurrently on a single-threaded runtime.
pub struct Controller<S: Surface> {
    engine: Option<Rc<dyn Reader>>,
    surface: RefCell<S>,
    blocks: RefCell<Vec<ExampleBlock>>,
    config: ControllerConfig,
}

impl<S: Surface> Controller<S> {
    pub fn new(engine: Option<Rc<dyn Reader>>, surface: S, config: ControllerConfig) -> Self {
        Self {
            engine,
            surface: RefCell::new(surface),
            blocks: RefCell::new(Vec::new()),
            config,
        }
    }

    /// Discover the page's example blocks and arm each of them
    pub fn load(&self, page: &Page) -> Vec<BlockId> {
        discover(page)
            .into_iter()
            .map(|block| self.arm(block))
            .collect()
    }

    /// Take the block's placeholder out of view and install its trigger
    ///
    /// Arming an already-known block does nothing.
    pub fn arm(&self, block: DiscoveredBlock) -> BlockId {
        let id = block.id;
        let mut blocks = self.blocks.borrow_mut();
        if blocks.iter().any(|b| b.id == id) {
            tracing::warn!("Block {} is already armed", id);
            return id;
        }

        let mut surface = self.surface.borrow_mut();
        surface.remove_placeholder(id);
        surface.insert_trigger(id);

        blocks.push(ExampleBlock {
            id,
            mode: block.mode,
            state: BlockState::Armed,
        });
        id
    }

    /// Activate a block: run its query (or reveal its canned payload) and place
    /// the output
    ///
    /// Returns `Activation::Ignored` for blocks that are no longer armed.
    ///
    /// # Errors
    ///
    /// - `UnknownBlock` if the block was never armed
    /// - `ReaderError` if a live block runs on a page without an engine
    /// - the engine's error if the query fails; the loading marker stays in
    ///   place and the block stays `Executing`
    pub async fn trigger(&self, id: BlockId) -> Result<Activation> {
        let mode = {
            let mut blocks = self.blocks.borrow_mut();
            let block = blocks
                .iter_mut()
                .find(|b| b.id == id)
                .ok_or(docsqlError::UnknownBlock(id.0))?;

            if block.state != BlockState::Armed {
                tracing::debug!("Ignoring activation of block {} ({:?})", id, block.state);
                return Ok(Activation::Ignored);
            }
            block.state = BlockState::Executing;
            block.mode.clone()
        };

        self.surface.borrow_mut().remove_trigger(id);

        match mode {
            BlockMode::Live { query } => {
                let engine = self.engine.clone().ok_or_else(|| {
                    docsqlError::ReaderError(format!(
                        "Block {} is live but the page has no engine",
                        id
                    ))
                })?;

                self.surface.borrow_mut().show_loading(id);
                let groups = engine.execute(&query).await?;
                self.surface.borrow_mut().clear_loading(id);

                let lines = render_result_set(&groups);
                self.surface.borrow_mut().append_lines(id, &lines);
            }
            BlockMode::Canned { payload } => {
                self.surface
                    .borrow_mut()
                    .append_fragment(id, self.config.canned_spacing, &payload);
            }
        }

        self.set_state(id, BlockState::Executed);
        tracing::debug!("Block {} executed", id);
        Ok(Activation::Executed)
    }

    /// Activate every armed block in document order
    ///
    /// A failing block does not stop the others.
    pub async fn run_all(&self) -> Vec<(BlockId, Result<Activation>)> {
        let ids: Vec<BlockId> = self
            .blocks
            .borrow()
            .iter()
            .filter(|b| b.state == BlockState::Armed)
            .map(|b| b.id)
            .collect();

        let mut outcomes = Vec::with_capacity(ids.len());
        for id in ids {
            outcomes.push((id, self.trigger(id).await));
        }
        outcomes
    }

    pub fn state(&self, id: BlockId) -> Option<BlockState> {
        self.blocks
            .borrow()
            .iter()
            .find(|b| b.id == id)
            .map(|b| b.state)
    }

    /// Snapshot of all block records, in the order they were armed
    pub fn blocks(&self) -> Vec<ExampleBlock> {
        self.blocks.borrow().clone()
    }

    /// Borrow the surface
    ///
    /// Drop the guard before awaiting an activation: an activation that
    /// resumes while the guard is alive panics on its own surface update. Use
    /// [`Controller::with_surface`] to read the surface while blocks are in
    /// flight.
    pub fn surface(&self) -> Ref<'_, S> {
        self.surface.borrow()
    }

    /// Read the surface without holding a borrow past the closure
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.surface.borrow())
    }

    pub fn into_surface(self) -> S {
        self.surface.into_inner()
    }

    fn set_state(&self, id: BlockId, state: BlockState) {
        if let Some(block) = self.blocks.borrow_mut().iter_mut().find(|b| b.id == id) {
            block.state = state;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::page::tests::{block, page};
    use crate::page::MemorySurface;
    use crate::result::{Column, ResultGroup, Row, Value};
    use async_trait::async_trait;

    /// Returns a fixed result; queries named "slow" yield a few times first
    struct FakeReader {
        groups: Vec<ResultGroup>,
        calls: RefCell<Vec<String>>,
    }

    impl FakeReader {
        fn new(groups: Vec<ResultGroup>) -> Self {
            Self {
                groups,
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    #[async_trait(?Send)]
    impl Reader for FakeReader {
        async fn execute(&self, sql: &str) -> Result<Vec<ResultGroup>> {
            if sql == "slow" {
                for _ in 0..5 {
                    tokio::task::yield_now().await;
                }
            }
            self.calls.borrow_mut().push(sql.to_string());
            Ok(self.groups.clone())
        }
    }

    struct FailingReader;

    #[async_trait(?Send)]
    impl Reader for FailingReader {
        async fn execute(&self, _sql: &str) -> Result<Vec<ResultGroup>> {
            Err(docsqlError::QueryError(
                "relation \"missing\" does not exist".to_string(),
            ))
        }
    }

    fn id_name() -> ResultGroup {
        ResultGroup::new(
            vec![Column::new("id"), Column::new("name")],
            vec![Row::new(vec![Value::Int(1), Value::from("a")])],
        )
        .unwrap()
    }

    fn live_controller(
        reader: Rc<dyn Reader>,
        p: &Page,
    ) -> (Controller<MemorySurface>, Vec<BlockId>) {
        let controller = Controller::new(
            Some(reader),
            MemorySurface::from_page(p),
            ControllerConfig::default(),
        );
        let ids = controller.load(p);
        (controller, ids)
    }

    #[test]
    fn test_arm_removes_placeholder_and_adds_trigger() {
        let p = page(
            "page.html",
            vec![block(&["pg"], "SELECT 1", Some("stale output"))],
        );
        let (controller, ids) = live_controller(Rc::new(FakeReader::new(vec![])), &p);

        assert_eq!(ids, vec![BlockId(0)]);
        assert_eq!(controller.state(BlockId(0)), Some(BlockState::Armed));

        let surface = controller.surface();
        let view = surface.view(BlockId(0)).unwrap();
        assert!(view.placeholder.is_none());
        assert_eq!(view.trigger.as_deref(), Some("Run"));
    }

    #[test]
    fn test_arm_twice_keeps_one_record() {
        let p = page("page.html", vec![block(&["pg"], "SELECT 1", None)]);
        let (controller, _) = live_controller(Rc::new(FakeReader::new(vec![])), &p);
        controller.load(&p);
        assert_eq!(controller.blocks().len(), 1);
    }

    #[tokio::test]
    async fn test_live_end_to_end() {
        let p = page("page.html", vec![block(&["pg"], "SELECT id, name FROM t;", None)]);
        let reader = Rc::new(FakeReader::new(vec![id_name()]));
        let (controller, _) = live_controller(reader.clone(), &p);

        let outcome = controller.trigger(BlockId(0)).await.unwrap();
        assert_eq!(outcome, Activation::Executed);
        assert_eq!(controller.state(BlockId(0)), Some(BlockState::Executed));
        assert_eq!(*reader.calls.borrow(), vec!["SELECT id, name FROM t;"]);

        let surface = controller.surface();
        let view = surface.view(BlockId(0)).unwrap();
        assert!(view.trigger.is_none());
        assert!(!view.loading);
        assert_eq!(
            view.text(),
            "SELECT id, name FROM t;\n\n id | name \n----------\n  1 |    a \n(1 row)\n"
        );
    }

    #[tokio::test]
    async fn test_second_activation_is_ignored() {
        let p = page("page.html", vec![block(&["pg"], "SELECT 1", None)]);
        let reader = Rc::new(FakeReader::new(vec![id_name()]));
        let (controller, _) = live_controller(reader.clone(), &p);

        controller.trigger(BlockId(0)).await.unwrap();
        let text = controller.surface().text(BlockId(0));

        let outcome = controller.trigger(BlockId(0)).await.unwrap();
        assert_eq!(outcome, Activation::Ignored);
        assert_eq!(reader.calls.borrow().len(), 1);
        assert_eq!(controller.surface().text(BlockId(0)), text);
    }

    #[tokio::test]
    async fn test_non_tabular_results_render_nothing() {
        let p = page("page.html", vec![block(&["pg"], "CREATE TABLE t(x INT)", None)]);
        let reader = Rc::new(FakeReader::new(vec![ResultGroup::empty()]));
        let (controller, _) = live_controller(reader, &p);

        controller.trigger(BlockId(0)).await.unwrap();
        assert_eq!(
            controller.surface().text(BlockId(0)).unwrap(),
            "CREATE TABLE t(x INT)\n"
        );
    }

    #[tokio::test]
    async fn test_query_failure_leaves_loading_marker() {
        let p = page("page.html", vec![block(&["pg"], "SELECT * FROM missing", None)]);
        let (controller, _) = live_controller(Rc::new(FailingReader), &p);

        let result = controller.trigger(BlockId(0)).await;
        assert!(matches!(result, Err(docsqlError::QueryError(_))));
        assert_eq!(controller.state(BlockId(0)), Some(BlockState::Executing));

        let surface = controller.surface();
        let view = surface.view(BlockId(0)).unwrap();
        assert!(view.trigger.is_none());
        assert!(view.loading);
        assert_eq!(view.text(), "SELECT * FROM missing\n...");
        drop(surface);

        // no retry: the block is no longer armed
        let outcome = controller.trigger(BlockId(0)).await.unwrap();
        assert_eq!(outcome, Activation::Ignored);
    }

    #[tokio::test]
    async fn test_unknown_block() {
        let p = page("page.html", vec![]);
        let (controller, _) = live_controller(Rc::new(FakeReader::new(vec![])), &p);
        let result = controller.trigger(BlockId(3)).await;
        assert!(matches!(result, Err(docsqlError::UnknownBlock(3))));
    }

    #[tokio::test]
    async fn test_canned_reveals_payload_verbatim() {
        let payload = "  x  \n-----\n  42 \n(1 row)\n <odd spacing> ";
        let p = page("page.html", vec![block(&["fake-pg"], "SELECT 42 AS x", Some(payload))]);
        let controller = Controller::new(None, MemorySurface::from_page(&p), ControllerConfig::default());
        controller.load(&p);

        let outcome = controller.trigger(BlockId(0)).await.unwrap();
        assert_eq!(outcome, Activation::Executed);

        let surface = controller.surface();
        let view = surface.view(BlockId(0)).unwrap();
        assert_eq!(view.output, format!("\n\n{}", payload));
        assert_eq!(view.text(), format!("SELECT 42 AS x\n\n{}", payload));
    }

    #[tokio::test]
    async fn test_canned_without_spacing() {
        let p = page("page.html", vec![block(&["fake-pg"], "SELECT 1", Some("one"))]);
        let config = ControllerConfig {
            canned_spacing: CannedSpacing::None,
        };
        let controller = Controller::new(None, MemorySurface::from_page(&p), config);
        controller.load(&p);

        controller.trigger(BlockId(0)).await.unwrap();
        assert_eq!(controller.surface().text(BlockId(0)).unwrap(), "SELECT 1one");
    }

    #[tokio::test]
    async fn test_canned_page_never_touches_engine() {
        let p = page(
            "page.html?fake-pg",
            vec![block(&["pg"], "SELECT 1", Some("cached"))],
        );
        let reader = Rc::new(FakeReader::new(vec![id_name()]));
        let (controller, _) = live_controller(reader.clone(), &p);

        controller.trigger(BlockId(0)).await.unwrap();
        assert!(reader.calls.borrow().is_empty());
        assert_eq!(
            controller.surface().text(BlockId(0)).unwrap(),
            "SELECT 1\n\ncached"
        );
    }

    #[tokio::test]
    async fn test_live_block_without_engine() {
        let p = page("page.html", vec![block(&["pg"], "SELECT 1", None)]);
        let controller = Controller::new(None, MemorySurface::from_page(&p), ControllerConfig::default());
        controller.load(&p);

        let result = controller.trigger(BlockId(0)).await;
        assert!(matches!(result, Err(docsqlError::ReaderError(_))));
    }

    #[tokio::test]
    async fn test_blocks_run_independently() {
        let p = page(
            "page.html",
            vec![
                block(&["pg"], "slow", None),
                block(&["pg"], "fast", None),
            ],
        );
        let reader = Rc::new(FakeReader::new(vec![id_name()]));
        let (controller, _) = live_controller(reader.clone(), &p);

        let (slow, fast) = tokio::join!(controller.trigger(BlockId(0)), async {
            tokio::task::yield_now().await;
            // the slow block is mid-flight and cannot be activated again
            assert_eq!(controller.state(BlockId(0)), Some(BlockState::Executing));
            assert!(controller.with_surface(|s| s.view(BlockId(0)).unwrap().loading));
            assert_eq!(
                controller.trigger(BlockId(0)).await.unwrap(),
                Activation::Ignored
            );
            controller.trigger(BlockId(1)).await
        });

        assert_eq!(slow.unwrap(), Activation::Executed);
        assert_eq!(fast.unwrap(), Activation::Executed);
        assert_eq!(*reader.calls.borrow(), vec!["fast", "slow"]);
    }

    #[tokio::test]
    async fn test_reading_surface_while_block_in_flight() {
        let p = page("page.html", vec![block(&["pg"], "slow", None)]);
        let reader = Rc::new(FakeReader::new(vec![id_name()]));
        let (controller, _) = live_controller(reader, &p);

        let (outcome, seen) = tokio::join!(controller.trigger(BlockId(0)), async {
            let mut seen = Vec::new();
            for _ in 0..8 {
                seen.push(controller.with_surface(|s| s.text(BlockId(0)).unwrap()));
                tokio::task::yield_now().await;
            }
            seen
        });

        assert_eq!(outcome.unwrap(), Activation::Executed);
        assert_eq!(seen[0], "slow\n...");
        assert_eq!(
            seen.last().unwrap(),
            "slow\n\n id | name \n----------\n  1 |    a \n(1 row)\n"
        );
    }

    #[tokio::test]
    async fn test_run_all_continues_after_failure() {
        let p = page(
            "page.html",
            vec![
                block(&["pg"], "SELECT 1", None),
                block(&["fake-pg"], "SELECT 2", Some("two")),
            ],
        );
        let (controller, _) = live_controller(Rc::new(FailingReader), &p);

        let outcomes = controller.run_all().await;
        assert_eq!(outcomes.len(), 2);
        assert!(outcomes[0].1.is_err());
        assert_eq!(outcomes[1].1.as_ref().unwrap(), &Activation::Executed);
        assert_eq!(controller.state(BlockId(1)), Some(BlockState::Executed));

        // nothing left to run
        assert!(controller.run_all().await.is_empty());
    }
}
