//! Resolution orchestrator
//!
//! Takes a batch of classified mod references and resolves each one against
//! its catalog. All lookups are launched together and polled on the calling
//! task, so outcomes and the progress counter are only touched from one
//! place. A batch either completes with exactly one outcome per reference
//! (in input order) or is cancelled and reports nothing.

pub mod classify;
pub mod outcome;
pub mod report;

pub use classify::{classify, classify_all, filter_lines, parse_url_list, ModReference};
pub use outcome::{LookupFailure, ResolutionOutcome};
pub use report::{DownloadItem, FailedMod, Report};

use crate::catalogs::{CurseForgeClient, Host, Loader, ModrinthClient};

use futures::stream::{FuturesUnordered, StreamExt};
use tokio::sync::mpsc::UnboundedSender;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Version and loader every file must match
#[derive(Debug, Clone)]
pub struct SearchParams {
    pub game_version: String,
    pub loader: Loader,
}

/// Progress notifications for a running batch
#[derive(Debug, Clone)]
pub enum ResolveEvent {
    Started { total: usize },
    /// One reference finished, whatever its outcome
    Progress {
        reference: ModReference,
        completed: usize,
        total: usize,
    },
    Finished,
    Cancelled,
}

#[derive(Debug)]
pub enum BatchResult {
    Completed(Vec<ResolutionOutcome>),
    Cancelled,
}

/// Resolves mod references against both catalogs
pub struct Resolver {
    curseforge: CurseForgeClient,
    modrinth: ModrinthClient,
}

impl Resolver {
    pub fn new(curseforge: CurseForgeClient, modrinth: ModrinthClient) -> Self {
        Self {
            curseforge,
            modrinth,
        }
    }

    pub fn curseforge(&self) -> &CurseForgeClient {
        &self.curseforge
    }

    pub fn modrinth(&self) -> &ModrinthClient {
        &self.modrinth
    }

    /// Resolve a whole batch.
    ///
    /// `events` is dropped when the batch ends, closing the receiver.
    pub async fn resolve(
        &self,
        references: Vec<ModReference>,
        params: &SearchParams,
        events: Option<UnboundedSender<ResolveEvent>>,
        cancel: &CancellationToken,
    ) -> BatchResult {
        let emit = |event: ResolveEvent| {
            if let Some(tx) = &events {
                let _ = tx.send(event);
            }
        };

        if cancel.is_cancelled() {
            emit(ResolveEvent::Cancelled);
            return BatchResult::Cancelled;
        }

        let total = references.len();
        let mut slots: Vec<Option<ResolutionOutcome>> = vec![None; total];
        let mut completed = 0usize;
        emit(ResolveEvent::Started { total });

        let mut pending = FuturesUnordered::new();
        for (index, reference) in references.into_iter().enumerate() {
            match self.immediate_outcome(&reference) {
                Some(outcome) => {
                    completed += 1;
                    emit(ResolveEvent::Progress {
                        reference,
                        completed,
                        total,
                    });
                    slots[index] = Some(outcome);
                }
                None => pending.push(async move {
                    let outcome = self.resolve_one(reference, params).await;
                    (index, outcome)
                }),
            }
        }

        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("Search cancelled with {}/{} mods resolved", completed, total);
                    emit(ResolveEvent::Cancelled);
                    return BatchResult::Cancelled;
                }
                next = pending.next() => match next {
                    Some((index, outcome)) => {
                        completed += 1;
                        emit(ResolveEvent::Progress {
                            reference: outcome.reference().clone(),
                            completed,
                            total,
                        });
                        slots[index] = Some(outcome);
                    }
                    None => break,
                },
            }
        }

        emit(ResolveEvent::Finished);
        BatchResult::Completed(slots.into_iter().flatten().collect())
    }

    /// Outcomes known without touching the network
    fn immediate_outcome(&self, reference: &ModReference) -> Option<ResolutionOutcome> {
        match reference.host {
            Host::Unsupported => {
                error!("URL '{}' is not supported", reference.url);
                Some(ResolutionOutcome::Unsupported {
                    reference: reference.clone(),
                })
            }
            Host::CurseForge if !self.curseforge.has_api_key() => {
                error!("Cannot search for '{}' because API key is not set", reference.url);
                Some(ResolutionOutcome::ModNotFound {
                    reference: reference.clone(),
                    cause: LookupFailure::MissingApiKey,
                })
            }
            _ => None,
        }
    }

    /// Resolve a single reference: find the mod, then its file
    pub async fn resolve_one(&self, reference: ModReference, params: &SearchParams) -> ResolutionOutcome {
        let host = reference.host;
        if host == Host::Unsupported {
            return ResolutionOutcome::Unsupported { reference };
        }

        info!("Looking for '{}' using {}", reference.slug, host);
        let found = match host {
            Host::CurseForge => self.curseforge.find_mod(&reference.slug).await,
            _ => self.modrinth.find_mod(&reference.slug).await,
        };

        let resolved = match found {
            Ok(Some(resolved)) => resolved,
            Ok(None) => {
                error!("Couldn't find mod '{}' using {}", reference.slug, host);
                return ResolutionOutcome::ModNotFound {
                    reference,
                    cause: LookupFailure::NoMatch,
                };
            }
            Err(e) => {
                error!("Couldn't look up mod '{}' using {}: {}", reference.slug, host, e);
                return ResolutionOutcome::ModNotFound {
                    reference,
                    cause: e.into(),
                };
            }
        };

        let file = match host {
            Host::CurseForge => {
                self.curseforge
                    .find_file(&resolved.mod_id, &params.game_version, params.loader)
                    .await
            }
            _ => {
                self.modrinth
                    .find_file(&resolved.mod_id, &params.game_version, params.loader)
                    .await
            }
        };

        match file {
            Ok(Some(file)) => {
                info!("Found file for '{}' using {}", reference.slug, host);
                ResolutionOutcome::Success {
                    reference,
                    resolved,
                    file,
                }
            }
            Ok(None) => {
                error!("Couldn't find correct file for '{}' using {}", reference.slug, host);
                ResolutionOutcome::FileNotFound {
                    reference,
                    mod_name: resolved.display_name,
                    cause: LookupFailure::NoMatch,
                }
            }
            Err(e) => {
                error!("Couldn't look up files for '{}' using {}: {}", reference.slug, host, e);
                ResolutionOutcome::FileNotFound {
                    reference,
                    mod_name: resolved.display_name,
                    cause: e.into(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalogs::CatalogConfig;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn params() -> SearchParams {
        SearchParams {
            game_version: "1.20.1".into(),
            loader: Loader::Fabric,
        }
    }

    fn resolver_for(server: &MockServer, api_key: Option<&str>) -> Resolver {
        let timeout = Duration::from_millis(500);
        let curseforge = CurseForgeClient::with_config(
            api_key,
            CatalogConfig::new(format!("{}/cf/v1", server.uri())).with_timeout(timeout),
        )
        .unwrap();
        let modrinth = ModrinthClient::with_config(
            CatalogConfig::new(format!("{}/mr/v2", server.uri())).with_timeout(timeout),
        )
        .unwrap();
        Resolver::new(curseforge, modrinth)
    }

    async fn mount_catalogs(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/cf/v1/mods/search"))
            .and(query_param("slug", "foo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "id": 100, "name": "Foo", "slug": "foo", "logo": null }]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cf/v1/mods/search"))
            .and(query_param("slug", "ghost"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/cf/v1/mods/100/files"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{
                    "id": 1, "fileName": "foo-1.0.jar",
                    "downloadUrl": "https://edge.forgecdn.net/files/foo-1.0.jar",
                    "gameVersions": ["1.20.1", "Fabric"]
                }]
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mr/v2/project/bar"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "slug": "bar", "title": "Bar", "icon_url": null
            })))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mr/v2/project/bar/version"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
                {
                    "id": "v1", "game_versions": ["1.19.2"], "loaders": ["fabric"],
                    "files": [{ "url": "https://cdn.modrinth.com/bar-old.jar", "filename": "bar-old.jar", "primary": true }]
                }
            ])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/mr/v2/project/baz"))
            .respond_with(ResponseTemplate::new(404))
            .mount(server)
            .await;
    }

    fn expect_completed(result: BatchResult) -> Vec<ResolutionOutcome> {
        match result {
            BatchResult::Completed(outcomes) => outcomes,
            BatchResult::Cancelled => panic!("batch was cancelled"),
        }
    }

    #[tokio::test]
    async fn test_mixed_batch_end_to_end() {
        let server = MockServer::start().await;
        mount_catalogs(&server).await;
        let resolver = resolver_for(&server, Some("key"));

        let references = classify_all(&[
            "https://www.curseforge.com/minecraft/mc-mods/foo",
            "https://modrinth.com/mod/baz",
            "https://example.org/not-a-mod",
        ]);
        let outcomes = expect_completed(
            resolver
                .resolve(references, &params(), None, &CancellationToken::new())
                .await,
        );

        assert_eq!(outcomes.len(), 3);
        assert!(matches!(&outcomes[0], ResolutionOutcome::Success { file, .. }
            if file.file_name == "foo-1.0.jar"));
        assert!(matches!(&outcomes[1], ResolutionOutcome::ModNotFound { cause: LookupFailure::NoMatch, .. }));
        assert!(matches!(&outcomes[2], ResolutionOutcome::Unsupported { .. }));
    }

    #[tokio::test]
    async fn test_one_outcome_per_reference_in_input_order() {
        let server = MockServer::start().await;
        mount_catalogs(&server).await;
        let resolver = resolver_for(&server, Some("key"));

        let urls = [
            "https://modrinth.com/mod/bar",
            "https://www.curseforge.com/minecraft/mc-mods/ghost",
            "https://example.org/x",
            "https://www.curseforge.com/minecraft/mc-mods/foo",
            "https://modrinth.com/mod/baz",
            "https://www.curseforge.com/minecraft/mc-mods/foo",
        ];
        let references = classify_all(&urls);
        let (tx, mut rx) = mpsc::unbounded_channel();

        let outcomes = expect_completed(
            resolver
                .resolve(references.clone(), &params(), Some(tx), &CancellationToken::new())
                .await,
        );

        assert_eq!(outcomes.len(), urls.len());
        for (outcome, reference) in outcomes.iter().zip(&references) {
            assert_eq!(outcome.reference(), reference);
        }
        assert!(matches!(&outcomes[0], ResolutionOutcome::FileNotFound { mod_name, .. } if mod_name == "Bar"));
        assert!(matches!(&outcomes[1], ResolutionOutcome::ModNotFound { .. }));
        assert!(outcomes[3].is_success());
        assert!(outcomes[5].is_success());

        let mut progress = 0;
        let mut finished = false;
        while let Some(event) = rx.recv().await {
            match event {
                ResolveEvent::Progress { completed, total, .. } => {
                    progress += 1;
                    assert_eq!(completed, progress);
                    assert_eq!(total, urls.len());
                }
                ResolveEvent::Finished => finished = true,
                ResolveEvent::Started { total } => assert_eq!(total, urls.len()),
                ResolveEvent::Cancelled => panic!("unexpected cancel"),
            }
        }
        assert_eq!(progress, urls.len());
        assert!(finished);
    }

    #[tokio::test]
    async fn test_unsupported_urls_make_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let resolver = resolver_for(&server, Some("key"));

        let references = classify_all(&["https://example.org/a", "ftp://mods.example/b"]);
        let outcomes = expect_completed(
            resolver
                .resolve(references, &params(), None, &CancellationToken::new())
                .await,
        );

        assert_eq!(outcomes.len(), 2);
        assert!(outcomes
            .iter()
            .all(|o| matches!(o, ResolutionOutcome::Unsupported { .. })));
    }

    #[tokio::test]
    async fn test_missing_api_key_makes_no_requests() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        let resolver = resolver_for(&server, None);

        let references = classify_all(&["https://www.curseforge.com/minecraft/mc-mods/foo"]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        let outcomes = expect_completed(
            resolver
                .resolve(references, &params(), Some(tx), &CancellationToken::new())
                .await,
        );

        assert!(matches!(
            &outcomes[0],
            ResolutionOutcome::ModNotFound { cause: LookupFailure::MissingApiKey, .. }
        ));
        assert_eq!(resolver.curseforge().request_count(), 0);

        let mut progress = 0;
        while let Some(event) = rx.recv().await {
            if matches!(event, ResolveEvent::Progress { .. }) {
                progress += 1;
            }
        }
        assert_eq!(progress, 1);
    }

    #[tokio::test]
    async fn test_cancel_discards_finished_outcomes() {
        let server = MockServer::start().await;
        mount_catalogs(&server).await;
        Mock::given(method("GET"))
            .and(path("/mr/v2/project/slow"))
            .respond_with(ResponseTemplate::new(404).set_delay(Duration::from_millis(400)))
            .mount(&server)
            .await;
        let resolver = resolver_for(&server, Some("key"));

        let references = classify_all(&[
            "https://www.curseforge.com/minecraft/mc-mods/foo",
            "https://modrinth.com/mod/slow",
        ]);
        let params = params();
        let cancel = CancellationToken::new();
        let (tx, mut rx) = mpsc::unbounded_channel();

        let canceller = async {
            let mut seen = Vec::new();
            while let Some(event) = rx.recv().await {
                if let ResolveEvent::Progress { reference, .. } = &event {
                    // Cancel once the fast lookup has finished
                    if reference.slug == "foo" {
                        cancel.cancel();
                    }
                }
                seen.push(event);
            }
            seen
        };

        let (result, events) = tokio::join!(
            resolver.resolve(references, &params, Some(tx), &cancel),
            canceller
        );

        assert!(matches!(result, BatchResult::Cancelled));
        assert!(matches!(events.last(), Some(ResolveEvent::Cancelled)));
        assert!(!events.iter().any(|e| matches!(e, ResolveEvent::Finished)));
    }

    #[tokio::test]
    async fn test_cancel_before_start() {
        let server = MockServer::start().await;
        let resolver = resolver_for(&server, Some("key"));
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = resolver
            .resolve(classify_all(&["https://modrinth.com/mod/bar"]), &params(), None, &cancel)
            .await;
        assert!(matches!(result, BatchResult::Cancelled));
    }

    #[tokio::test]
    async fn test_timed_out_lookup_only_fails_its_reference() {
        let server = MockServer::start().await;
        mount_catalogs(&server).await;
        Mock::given(method("GET"))
            .and(path("/mr/v2/project/stuck"))
            .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(3)))
            .expect(4)
            .mount(&server)
            .await;
        let resolver = resolver_for(&server, Some("key"));

        let references = classify_all(&[
            "https://modrinth.com/mod/stuck",
            "https://www.curseforge.com/minecraft/mc-mods/foo",
        ]);
        let outcomes = expect_completed(
            resolver
                .resolve(references, &params(), None, &CancellationToken::new())
                .await,
        );

        assert!(matches!(
            &outcomes[0],
            ResolutionOutcome::ModNotFound { cause: LookupFailure::TimedOut { attempts: 4 }, .. }
        ));
        assert!(outcomes[1].is_success());
    }
}
