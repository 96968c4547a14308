use axum::http::StatusCode;
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;

/// Running latency aggregate per route. Constant memory no matter how many
/// requests a route serves.
#[derive(Debug, Default, Clone, Copy)]
struct LatencyAccum {
    sum_ns: u64,
    count: u64,
}

#[derive(Default)]
pub(crate) struct RequestMetrics {
    counts: Mutex<HashMap<(String, u16), u64>>,
    latency: Mutex<HashMap<String, LatencyAccum>>,
}

impl RequestMetrics {
    pub(crate) async fn observe_request(&self, route: &str, status: StatusCode, latency: Duration) {
        let mut counts = self.counts.lock().await;
        *counts
            .entry((route.to_string(), status.as_u16()))
            .or_insert(0) += 1;
        drop(counts);
        let mut latency_map = self.latency.lock().await;
        let accum = latency_map.entry(route.to_string()).or_default();
        accum.sum_ns = accum.sum_ns.saturating_add(latency.as_nanos() as u64);
        accum.count += 1;
    }

    /// Prometheus-style text exposition: request counts per route/status
    /// and a latency sum and count per route.
    pub(crate) async fn render(&self) -> String {
        let mut out = String::new();
        out.push_str("# TYPE contactd_requests_total counter\n");
        let counts = self.counts.lock().await;
        let mut rows: Vec<(&(String, u16), &u64)> = counts.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        for ((route, status), count) in rows {
            out.push_str(&format!(
                "contactd_requests_total{{route=\"{route}\",status=\"{status}\"}} {count}\n"
            ));
        }
        drop(counts);

        out.push_str("# TYPE contactd_request_latency_seconds summary\n");
        let latency = self.latency.lock().await;
        let mut rows: Vec<(&String, &LatencyAccum)> = latency.iter().collect();
        rows.sort_by(|a, b| a.0.cmp(b.0));
        for (route, accum) in rows {
            let sum_secs = accum.sum_ns as f64 / 1e9;
            out.push_str(&format!(
                "contactd_request_latency_seconds_sum{{route=\"{route}\"}} {sum_secs:.6}\n"
            ));
            out.push_str(&format!(
                "contactd_request_latency_seconds_count{{route=\"{route}\"}} {}\n",
                accum.count
            ));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn rendered_metrics_carry_per_route_status_counts() {
        let metrics = RequestMetrics::default();
        metrics
            .observe_request("/contacts", StatusCode::OK, Duration::from_millis(3))
            .await;
        metrics
            .observe_request("/contacts", StatusCode::OK, Duration::from_millis(2))
            .await;
        metrics
            .observe_request("/contacts/:id", StatusCode::NOT_FOUND, Duration::from_millis(1))
            .await;

        let text = metrics.render().await;
        assert!(text.contains("contactd_requests_total{route=\"/contacts\",status=\"200\"} 2"));
        assert!(text.contains("contactd_requests_total{route=\"/contacts/:id\",status=\"404\"} 1"));
        assert!(text.contains("contactd_request_latency_seconds_sum{route=\"/contacts\"} 0.005"));
        assert!(text.contains("contactd_request_latency_seconds_count{route=\"/contacts\"} 2"));
    }

    #[tokio::test]
    async fn latency_aggregate_stays_two_words_per_route() {
        let metrics = RequestMetrics::default();
        for _ in 0..10_000 {
            metrics
                .observe_request("/contacts", StatusCode::OK, Duration::from_micros(5))
                .await;
        }
        let latency = metrics.latency.lock().await;
        let accum = latency.get("/contacts").expect("route tracked");
        assert_eq!(accum.count, 10_000);
        assert_eq!(accum.sum_ns, 10_000 * 5_000);
    }
}
