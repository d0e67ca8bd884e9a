//! Ambient correlation-ID propagation.
//!
//! A correlation ID stitches together the log records produced for a single request or
//! batch task across components. The value lives in a tokio task-local rather than a
//! global, so concurrent requests never observe each other's IDs. Logging helpers read
//! the ambient value with [`current_correlation_id`] and attach it as a `correlation_id`
//! field when present.

use std::future::Future;

use uuid::Uuid;

tokio::task_local! {
    static CORRELATION_ID: String;
}

/// Run `fut` with `id` installed as the ambient correlation ID.
pub async fn with_correlation_id<F>(id: String, fut: F) -> F::Output
where
    F: Future,
{
    CORRELATION_ID.scope(id, fut).await
}

/// Read the correlation ID for the current task, if one is in scope.
pub fn current_correlation_id() -> Option<String> {
    CORRELATION_ID.try_with(|id| id.clone()).ok()
}

/// Generate a fresh correlation ID for requests that did not supply one.
pub fn generate_correlation_id() -> String {
    Uuid::new_v4().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn correlation_id_is_scoped_to_the_task() {
        assert_eq!(current_correlation_id(), None);

        let observed = with_correlation_id("abc-123".into(), async {
            current_correlation_id()
        })
        .await;
        assert_eq!(observed.as_deref(), Some("abc-123"));

        assert_eq!(current_correlation_id(), None);
    }

    #[tokio::test]
    async fn nested_scopes_shadow_the_outer_id() {
        let inner = with_correlation_id("outer".into(), async {
            with_correlation_id("inner".into(), async { current_correlation_id() }).await
        })
        .await;
        assert_eq!(inner.as_deref(), Some("inner"));
    }

    #[test]
    fn generated_ids_are_uuids() {
        let id = generate_correlation_id();
        assert!(Uuid::parse_str(&id).is_ok());
    }
}
