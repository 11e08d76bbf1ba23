//! Background tasks driving an [`AnalysisSession`].
//!
//! Two long-running tasks are spawned once the client is initialized:
//! one takes dirty documents off the session queue and reanalyzes each on
//! the blocking pool, the other publishes diagnostic sets as their
//! debounce windows close.

use std::sync::Arc;
use std::time::Instant;

use rill_analysis::{AnalysisSession, DuePublication};
use rill_common::{LineIndex, PositionEncoding};
use tokio::sync::Notify;
use tower_lsp::lsp_types::{Diagnostic, Url};
use tower_lsp::Client;

use crate::convert;

/// Reanalyze queued documents forever, waking the publisher after each run.
pub async fn reanalysis_loop(session: Arc<AnalysisSession>, publish_wake: Arc<Notify>) {
    dispatch(session, publish_wake, |session: &AnalysisSession, uri: &Url| {
        session.reanalyze(uri);
    })
    .await
}

/// Hand every queued document to `analyze` on the blocking pool without
/// waiting for earlier ones. Documents run in parallel; the session keeps
/// a second run of the same URI from starting while one is in flight.
async fn dispatch<F>(session: Arc<AnalysisSession>, publish_wake: Arc<Notify>, analyze: F)
where
    F: Fn(&AnalysisSession, &Url) + Send + Sync + 'static,
{
    let analyze = Arc::new(analyze);
    loop {
        let uri = session.wait_for_task().await;
        let worker = Arc::clone(&session);
        let analyze = Arc::clone(&analyze);
        let wake = Arc::clone(&publish_wake);
        tokio::spawn(async move {
            let run = tokio::task::spawn_blocking(move || {
                analyze(&worker, &uri);
                wake.notify_one();
            });
            if let Err(err) = run.await {
                tracing::error!(%err, "reanalysis task failed");
            }
        });
    }
}

/// Publish due diagnostic sets, then sleep until the next deadline or
/// until woken.
pub async fn publish_loop(
    session: Arc<AnalysisSession>,
    client: Client,
    wake: Arc<Notify>,
    encoding: PositionEncoding,
) {
    loop {
        for due in session.take_due(Instant::now()) {
            let (uri, diagnostics, version) = publish_params(&due, encoding);
            tracing::debug!(%uri, ?version, count = diagnostics.len(), "publishing diagnostics");
            client.publish_diagnostics(uri, diagnostics, version).await;
        }

        match session.next_publication_deadline() {
            Some(deadline) => {
                let deadline = tokio::time::Instant::from_std(deadline);
                tokio::select! {
                    _ = tokio::time::sleep_until(deadline) => {}
                    _ = wake.notified() => {}
                }
            }
            None => wake.notified().await,
        }
    }
}

/// Arguments of `textDocument/publishDiagnostics` for one due set.
///
/// Ranges are converted with the line index of the snapshot the set was
/// computed from. A closed document has no snapshot and publishes an
/// empty set without a version.
pub fn publish_params(
    due: &DuePublication,
    encoding: PositionEncoding,
) -> (Url, Vec<Diagnostic>, Option<i32>) {
    let publication = &due.publication;
    let empty;
    let index = match &due.snapshot {
        Some(snapshot) => &*snapshot.line_index,
        None => {
            empty = LineIndex::new("");
            &empty
        }
    };
    let diagnostics = publication
        .diagnostics
        .iter()
        .map(|d| convert::diagnostic(&publication.uri, index, encoding, d))
        .collect();
    (publication.uri.clone(), diagnostics, publication.version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rill_analysis::{AnalysisConfig, EditDelta, VersionedEdit};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;
    use tower_lsp::lsp_types::{NumberOrString, Position};

    fn session() -> Arc<AnalysisSession> {
        Arc::new(AnalysisSession::new(AnalysisConfig {
            debounce_ms: 0,
            ..AnalysisConfig::default()
        }))
    }

    fn uri() -> Url {
        Url::parse("file:///w/main.rill").unwrap()
    }

    #[test]
    fn publication_uses_its_own_snapshot() {
        let session = session();
        session.did_open(&uri(), "let a = 1;\na;\n  nope;\n", 1).unwrap();
        session.drain_tasks();

        let due = session.take_due(Instant::now());
        assert_eq!(due.len(), 1);
        let (published, diagnostics, version) = publish_params(&due[0], PositionEncoding::Utf16);
        assert_eq!(published, uri());
        assert_eq!(version, Some(1));
        let unresolved = diagnostics
            .iter()
            .find(|d| d.message == "cannot find `nope` in this scope")
            .unwrap();
        assert_eq!(unresolved.range.start, Position::new(2, 2));
        assert!(matches!(unresolved.code, Some(NumberOrString::String(_))));
    }

    #[test]
    fn closed_document_publishes_empty_set() {
        let session = session();
        session.did_open(&uri(), "oops;\n", 1).unwrap();
        session.drain_tasks();
        session.take_due(Instant::now());

        session.did_close(&uri()).unwrap();
        let due = session.take_due(Instant::now());
        assert_eq!(due.len(), 1);
        assert!(due[0].snapshot.is_none());
        let (_, diagnostics, version) = publish_params(&due[0], PositionEncoding::Utf16);
        assert!(diagnostics.is_empty());
        assert_eq!(version, None);
    }

    #[tokio::test]
    async fn reanalysis_loop_commits_and_wakes_publisher() {
        let session = session();
        let wake = Arc::new(Notify::new());
        let task = tokio::spawn(reanalysis_loop(Arc::clone(&session), Arc::clone(&wake)));

        session.did_open(&uri(), "let a = 1;\n", 1).unwrap();
        wake.notified().await;
        assert_eq!(session.snapshot(&uri()).unwrap().version, 1);

        session
            .did_change(
                &uri(),
                &VersionedEdit {
                    base_version: Some(1),
                    target_version: 2,
                    deltas: vec![EditDelta::full("let b = 2;\n")],
                },
            )
            .unwrap();
        wake.notified().await;
        assert_eq!(session.snapshot(&uri()).unwrap().version, 2);
        task.abort();
    }

    #[tokio::test]
    async fn slow_document_does_not_hold_up_others() {
        let session = session();
        let wake = Arc::new(Notify::new());
        let gate = Arc::new(AtomicBool::new(false));
        let slow = Url::parse("file:///w/slow.rill").unwrap();
        let task = {
            let gate = Arc::clone(&gate);
            let slow = slow.clone();
            tokio::spawn(dispatch(
                Arc::clone(&session),
                Arc::clone(&wake),
                move |session: &AnalysisSession, uri: &Url| {
                    if *uri == slow {
                        while !gate.load(Ordering::Acquire) {
                            std::thread::sleep(Duration::from_millis(1));
                        }
                    }
                    session.reanalyze(uri);
                },
            ))
        };

        session.did_open(&slow, "let s = 1;\n", 1).unwrap();
        session.did_open(&uri(), "let a = 1;\n", 1).unwrap();
        tokio::time::timeout(Duration::from_secs(10), wake.notified())
            .await
            .expect("fast document was never analyzed");
        assert_eq!(session.snapshot(&uri()).unwrap().version, 1);
        assert!(session.snapshot(&slow).is_none());

        gate.store(true, Ordering::Release);
        tokio::time::timeout(Duration::from_secs(10), wake.notified())
            .await
            .expect("slow document was never analyzed");
        assert_eq!(session.snapshot(&slow).unwrap().version, 1);
        task.abort();
    }
}
