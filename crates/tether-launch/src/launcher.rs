//! Build-then-start convenience.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::builder::LaunchConfigBuilder;
use crate::descriptor::PluginDescriptor;
use crate::error::LaunchResult;
use crate::factory::ExecutionFactory;
use crate::options::LaunchOptions;
use crate::settings::LaunchSettings;
use crate::wrapping::WrappingClient;

/// Pairs a [`LaunchConfigBuilder`] with an [`ExecutionFactory`].
pub struct PluginLauncher<W: ?Sized, F> {
    builder: LaunchConfigBuilder<W>,
    factory: F,
}

impl<W, F> PluginLauncher<W, F>
where
    W: WrappingClient + ?Sized,
    F: ExecutionFactory,
{
    /// Create a launcher with default settings.
    #[must_use]
    pub fn new(wrapper: Arc<W>, factory: F) -> Self {
        Self {
            builder: LaunchConfigBuilder::new(wrapper),
            factory,
        }
    }

    /// Replace the builder settings.
    #[must_use]
    pub fn with_settings(mut self, settings: LaunchSettings) -> Self {
        self.builder = self.builder.with_settings(settings);
        self
    }

    /// The underlying builder.
    #[must_use]
    pub fn builder(&self) -> &LaunchConfigBuilder<W> {
        &self.builder
    }

    /// The underlying factory.
    #[must_use]
    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Build a configuration for `descriptor` and start it.
    ///
    /// # Errors
    ///
    /// Any error from [`LaunchConfigBuilder::build`] or from the factory.
    /// The factory is not called if the build fails.
    pub async fn launch(
        &self,
        descriptor: &PluginDescriptor,
        options: LaunchOptions,
        cancel: &CancellationToken,
    ) -> LaunchResult<F::Handle> {
        let config = self.builder.build(descriptor, options, cancel).await?;
        let backend = config.backend().kind();
        let handle = self.factory.start(config).await?;
        info!(plugin = %descriptor.name, backend, "plugin launched");
        Ok(handle)
    }
}
