//! Transfer orchestration
//!
//! One orchestrator invocation is one cycle: resolve backends, run the
//! selected mode, release everything. Backends are owned exclusively by the
//! cycle that created them and are closed on every exit path, including
//! failures. Processing is sequential; callers must not run two cycles over
//! the same source/destination pair concurrently: listing has no fencing
//! against a sibling cycle deleting what it just listed.

use anyhow::Context;

use ferry_core::{destination_root, Config};
use ferry_queue::MessageQueue;
use ferry_storage::{create_storage, Storage};

pub struct Orchestrator<'a> {
    config: &'a Config,
}

async fn close_backend(backend: &dyn Storage, role: &str) {
    if let Err(e) = backend.close().await {
        tracing::warn!(
            backend = %backend.kind(),
            role = role,
            error = %e,
            "Error while closing backend"
        );
    }
}

impl<'a> Orchestrator<'a> {
    pub fn new(config: &'a Config) -> Self {
        Orchestrator { config }
    }

    /// Run the mode selected by configuration: consume wins over publish,
    /// publish wins over the default batch poll.
    pub async fn run(&self) -> anyhow::Result<()> {
        if self.config.transfer.consume_mode {
            self.run_consume().await
        } else if self.config.transfer.publish_mode {
            self.run_publish().await
        } else {
            self.run_cycle().await
        }
    }

    /// Resolve source and destination backends for one cycle.
    ///
    /// The destination root is rebuilt on every call so a cycle starting
    /// after a UTC day boundary lands in the new date partition.
    async fn resolve_backends(&self) -> anyhow::Result<(Box<dyn Storage>, Box<dyn Storage>)> {
        let staging_dir = &self.config.transfer.staging_dir;

        let source = create_storage(&self.config.source, &self.config.source.path, staging_dir)
            .await
            .with_context(|| {
                format!("failed to resolve source backend ({})", self.config.source.kind)
            })?;

        let dest_root = destination_root(
            &self.config.dest.path,
            self.config.dest.kind,
            self.config.transfer.date_partition,
            staging_dir,
        );

        match create_storage(&self.config.dest, &dest_root, staging_dir).await {
            Ok(dest) => {
                tracing::debug!(
                    source = %self.config.source.kind,
                    dest = %self.config.dest.kind,
                    dest_root = %dest_root,
                    "Resolved backends"
                );
                Ok((source, dest))
            }
            Err(e) => {
                // The source session is already open and must not leak.
                close_backend(source.as_ref(), "source").await;
                Err(e).with_context(|| {
                    format!(
                        "failed to resolve destination backend ({})",
                        self.config.dest.kind
                    )
                })
            }
        }
    }

    /// Batch-poll mode: move up to `batch_size` files from the front of the
    /// source listing.
    pub async fn run_cycle(&self) -> anyhow::Result<()> {
        tracing::info!("Started processing files");
        let (source, dest) = self.resolve_backends().await?;

        let result = self.transfer_batch(source.as_ref(), dest.as_ref()).await;

        close_backend(source.as_ref(), "source").await;
        close_backend(dest.as_ref(), "dest").await;

        if let Err(e) = &result {
            tracing::error!(error = ?e, "Transfer cycle failed");
        }
        result
    }

    async fn transfer_batch(
        &self,
        source: &dyn Storage,
        dest: &dyn Storage,
    ) -> anyhow::Result<()> {
        let listing = source
            .list()
            .await
            .with_context(|| format!("failed to list source ({})", source.kind()))?;

        // Truncation happens strictly after listing; backends are never
        // asked to filter server-side.
        let total = listing.len();
        let batch: Vec<String> = listing
            .into_iter()
            .take(self.config.transfer.batch_size)
            .collect();

        tracing::info!(
            batch = batch.len(),
            listed = total,
            source = %source.kind(),
            dest = %dest.kind(),
            "Transferring files"
        );

        for name in &batch {
            if name.is_empty() {
                tracing::debug!("Skipping empty file reference");
                continue;
            }
            // Any failure aborts the whole batch, not just this file.
            self.transfer_one(source, dest, name).await?;
        }

        Ok(())
    }

    /// The per-file transfer protocol: read, write into the destination
    /// root, delete the source copy unless configured to keep it, then make
    /// the file visible where the destination stages its writes.
    async fn transfer_one(
        &self,
        source: &dyn Storage,
        dest: &dyn Storage,
        name: &str,
    ) -> anyhow::Result<()> {
        let content = source
            .read(name)
            .await
            .with_context(|| format!("failed to read {} from source ({})", name, source.kind()))?;

        dest.write(name, &content)
            .await
            .with_context(|| format!("failed to write {} to destination ({})", name, dest.kind()))?;

        if !self.config.transfer.copy_source {
            source.delete(name).await.with_context(|| {
                format!("failed to delete {} from source ({})", name, source.kind())
            })?;
        }

        if dest.uses_staging() {
            dest.promote().await.with_context(|| {
                format!("failed to promote staged files ({})", dest.kind())
            })?;
        }

        tracing::info!(
            file = %name,
            from = %source.kind(),
            to = %dest.kind(),
            size_bytes = content.len(),
            "Transferred file"
        );

        Ok(())
    }

    /// Publish-only mode: announce every listed source file as a transfer
    /// event without touching file content.
    pub async fn run_publish(&self) -> anyhow::Result<()> {
        let source = create_storage(
            &self.config.source,
            &self.config.source.path,
            &self.config.transfer.staging_dir,
        )
        .await
        .with_context(|| {
            format!("failed to resolve source backend ({})", self.config.source.kind)
        })?;

        let queue = match MessageQueue::connect(&self.config.queue).await {
            Ok(queue) => queue,
            Err(e) => {
                close_backend(source.as_ref(), "source").await;
                return Err(e).context("failed to connect to broker");
            }
        };

        let result = async {
            let listing = source
                .list()
                .await
                .with_context(|| format!("failed to list source ({})", source.kind()))?;

            for name in &listing {
                if name.is_empty() {
                    continue;
                }
                queue
                    .publish(name)
                    .await
                    .with_context(|| format!("failed to publish event for {}", name))?;
            }

            tracing::info!(published = listing.len(), "Published source listing");
            Ok(())
        }
        .await;

        if let Err(e) = queue.close().await {
            tracing::warn!(error = %e, "Error while closing queue");
        }
        close_backend(source.as_ref(), "source").await;

        if let Err(e) = &result {
            tracing::error!(error = ?e, "Publish cycle failed");
        }
        result
    }

    /// Consume-loop mode: block on the queue and run the single-file
    /// transfer protocol once per delivered event, republishing downstream
    /// when configured. A failed transfer leaves the message unacknowledged.
    pub async fn run_consume(&self) -> anyhow::Result<()> {
        let queue = MessageQueue::connect(&self.config.queue)
            .await
            .context("failed to connect to broker")?;

        let republish = match &self.config.queue.republish_queue {
            Some(name) => Some(
                MessageQueue::connect_to(&self.config.queue, name)
                    .await
                    .with_context(|| format!("failed to connect to republish queue {}", name))?,
            ),
            None => None,
        };
        let republish_ref = republish.as_ref();

        let result = queue
            .consume(|event| async move {
                self.transfer_single_file(&event.filename).await?;
                if let Some(downstream) = republish_ref {
                    downstream
                        .publish(&event.filename)
                        .await
                        .with_context(|| {
                            format!("failed to republish event for {}", event.filename)
                        })?;
                }
                Ok(())
            })
            .await
            .context("consume loop failed");

        if let Some(downstream) = &republish {
            if let Err(e) = downstream.close().await {
                tracing::warn!(error = %e, "Error while closing republish queue");
            }
        }
        if let Err(e) = queue.close().await {
            tracing::warn!(error = %e, "Error while closing queue");
        }

        result
    }

    /// Transfer one named file with backends resolved and released for this
    /// message alone.
    pub async fn transfer_single_file(&self, name: &str) -> anyhow::Result<()> {
        if name.is_empty() {
            tracing::debug!("Skipping empty file reference");
            return Ok(());
        }

        let (source, dest) = self.resolve_backends().await?;
        let result = self.transfer_one(source.as_ref(), dest.as_ref(), name).await;

        close_backend(source.as_ref(), "source").await;
        close_backend(dest.as_ref(), "dest").await;

        result
    }
}
