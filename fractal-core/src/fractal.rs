//! Host-facing lifecycle of a fractal tree.
//!
//! A [`Fractal`] is either inactive (no storage) or active (allocated,
//! populated and ready for frames). Every transition is an explicit call;
//! calling one in the wrong state is a [`FractalError::LifecycleMisuse`].

use rand::Rng;
use tracing::{info, warn};

use crate::{
    config::FractalConfig,
    error::{FractalError, Result},
    export::{InstanceExporter, Renderer},
    factory,
    kernel::RootTransform,
    scheduler::{ExecutionStrategy, FractalScheduler},
    table::PartTable,
};

#[derive(Debug)]
struct ActiveTree {
    config: FractalConfig,
    table: PartTable,
    exporter: InstanceExporter,
}

#[derive(Debug, Default)]
enum State {
    #[default]
    Inactive,
    Active(ActiveTree),
}

/// An animated fractal tree and its lifecycle.
#[derive(Debug, Default)]
pub struct Fractal {
    scheduler: FractalScheduler,
    state: State,
}

impl Fractal {
    /// Creates an inactive fractal using `strategy` for its frame updates.
    pub fn new(strategy: ExecutionStrategy) -> Result<Self> {
        Ok(Self {
            scheduler: FractalScheduler::new(strategy)?,
            state: State::Inactive,
        })
    }

    /// Validates `config`, then allocates and populates the tree.
    ///
    /// All construction-time draws (spin, sag, shading sequences) come from
    /// `rng`.
    ///
    /// ### Errors
    /// - [`FractalError::LifecycleMisuse`] if already active.
    /// - [`FractalError::Configuration`] for an invalid config.
    /// - [`FractalError::Allocation`] if storage cannot be reserved; the
    ///   fractal stays inactive.
    pub fn activate(&mut self, config: FractalConfig, rng: &mut impl Rng) -> Result<()> {
        if self.is_active() {
            warn!("activate called on an active fractal");
            return Err(FractalError::misuse("fractal is already active"));
        }
        config.validate()?;

        let mut table = PartTable::allocate(config.depth)?;
        factory::populate(&mut table, &config.spawn_ranges(), rng)?;
        let exporter = InstanceExporter::new(config.shading.clone(), config.depth, rng);

        info!(
            depth = config.depth,
            parts = table.total_part_count(),
            strategy = ?self.scheduler.strategy(),
            "fractal activated"
        );
        self.state = State::Active(ActiveTree {
            config,
            table,
            exporter,
        });
        Ok(())
    }

    /// Releases all level storage.
    ///
    /// ### Errors
    /// [`FractalError::LifecycleMisuse`] if the fractal is not active.
    pub fn deactivate(&mut self) -> Result<()> {
        let State::Active(mut tree) = std::mem::take(&mut self.state) else {
            warn!("deactivate called on an inactive fractal");
            return Err(FractalError::misuse("fractal is not active"));
        };
        tree.table.release()?;
        info!(depth = tree.config.depth, "fractal deactivated");
        Ok(())
    }

    /// Replaces the live tree with one built from `config`.
    ///
    /// The new config is validated first, so an invalid one leaves the
    /// current tree running. Otherwise this is a full deactivate followed by
    /// activate; storage is never resized in place.
    ///
    /// ### Errors
    /// [`FractalError::LifecycleMisuse`] if the fractal is not active, plus
    /// anything [`Fractal::activate`] returns.
    pub fn reconfigure(&mut self, config: FractalConfig, rng: &mut impl Rng) -> Result<()> {
        if !self.is_active() {
            warn!("reconfigure called on an inactive fractal");
            return Err(FractalError::misuse("fractal is not active"));
        }
        config.validate()?;

        info!(depth = config.depth, "reconfiguring fractal");
        self.deactivate()?;
        self.activate(config, rng)
    }

    /// Advances the tree by `dt` and hands every level to `renderer`.
    ///
    /// Export starts only after all levels have been updated.
    ///
    /// ### Errors
    /// [`FractalError::LifecycleMisuse`] if the fractal is not active.
    pub fn frame_update<R: Renderer + ?Sized>(
        &mut self,
        dt: f32,
        root: &RootTransform,
        renderer: &mut R,
    ) -> Result<()> {
        let State::Active(tree) = &mut self.state else {
            return Err(FractalError::misuse("frame update on an inactive fractal"));
        };
        self.scheduler.update(&mut tree.table, dt, root)?;
        tree.exporter.export(&tree.table, root, renderer);
        Ok(())
    }

    pub fn is_active(&self) -> bool {
        matches!(self.state, State::Active(_))
    }

    /// Config of the live tree, if any.
    pub fn config(&self) -> Option<&FractalConfig> {
        match &self.state {
            State::Active(tree) => Some(&tree.config),
            State::Inactive => None,
        }
    }

    /// Live parts of the tree, if any.
    pub fn table(&self) -> Option<&PartTable> {
        match &self.state {
            State::Active(tree) => Some(&tree.table),
            State::Inactive => None,
        }
    }

    /// Number of allocated part slots; zero when inactive.
    pub fn outstanding_parts(&self) -> usize {
        self.table().map_or(0, PartTable::total_part_count)
    }
}
