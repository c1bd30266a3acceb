//! The delay tracking page: each user action or timer tick becomes one
//! backend call, and the reply becomes a dialog, the total text or a chart
//! redraw.

use tracing::{debug, warn};

use crate::chart::{chart_data, line_chart_config, series_values, Chart, ChartSurface};
use crate::client::{DelayApi, Download};
use crate::error::ClientError;
use crate::models::Reason;

pub const RESET_PROMPT: &str = "Enter password to reset data:";

/// What the page needs from its host: the reason selector, dialogs, the
/// total-minutes element and somewhere to put downloaded files.
#[allow(async_fn_in_trait)]
pub trait PageView {
    fn selected_reason(&self) -> Reason;
    fn alert(&mut self, message: &str);
    /// Blocking prompt; `None` when the user cancels
    async fn prompt(&mut self, message: &str) -> Option<String>;
    fn set_total_minutes(&mut self, text: &str);
    fn save_download(&mut self, download: Download);
}

/// Owns the page's only long-lived state, the chart, which is created on the
/// first stats refresh and redrawn in place afterwards.
pub struct PageController<A, V, S>
where
    A: DelayApi,
    V: PageView,
    S: ChartSurface,
{
    api: A,
    view: V,
    surface: S,
    chart: Option<S::Chart>,
}

impl<A, V, S> PageController<A, V, S>
where
    A: DelayApi,
    V: PageView,
    S: ChartSurface,
{
    pub fn new(api: A, view: V, surface: S) -> Self {
        Self {
            api,
            view,
            surface,
            chart: None,
        }
    }

    pub fn view(&self) -> &V {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut V {
        &mut self.view
    }

    fn transport_failed(&mut self, action: &str, e: ClientError) {
        warn!("{} request failed: {}", action, e);
        self.view.alert(&format!("Request failed: {e}"));
    }

    pub async fn start_delay(&mut self) {
        let reason = self.view.selected_reason();
        debug!(%reason, "starting delay");

        match self.api.start(reason).await {
            Ok(reply) => match reply.into_result() {
                Ok(_) => self.view.alert("Delay started!"),
                Err(error) => self.view.alert(&error),
            },
            Err(e) => self.transport_failed("start", e),
        }
    }

    pub async fn end_delay(&mut self) {
        match self.api.end().await {
            Ok(reply) => match reply.into_result() {
                Ok(ended) => self.view.alert(&format!(
                    "Delay ended! Duration: {:.2} minutes",
                    ended.duration_minutes
                )),
                Err(error) => self.view.alert(&error),
            },
            Err(e) => self.transport_failed("end", e),
        }
    }

    pub async fn download_report(&mut self) {
        match self.api.download().await {
            Ok(download) => self.view.save_download(download),
            Err(e) => self.transport_failed("download", e),
        }
    }

    /// Nothing is sent when the prompt is cancelled or left empty.
    pub async fn reset_data(&mut self) {
        let password = match self.view.prompt(RESET_PROMPT).await {
            Some(p) if !p.is_empty() => p,
            _ => return,
        };

        match self.api.reset(&password).await {
            Ok(reply) => match reply.into_result() {
                Ok(done) => {
                    self.view.alert(&done.message);
                    self.refresh_stats().await;
                }
                Err(error) => self.view.alert(&error),
            },
            Err(e) => self.transport_failed("reset", e),
        }
    }

    pub async fn refresh_stats(&mut self) {
        let stats = match self.api.stats().await {
            Ok(stats) => stats,
            Err(e) => return self.transport_failed("stats", e),
        };

        self.view
            .set_total_minutes(&format!("{:.2}", stats.total_duration_minutes));

        let data = chart_data(&stats);
        match self.chart.as_mut() {
            Some(chart) => {
                let current = chart.data_mut();
                for (series, reason) in current.datasets.iter_mut().zip(Reason::ALL) {
                    series.data = series_values(&stats, &data.labels, reason);
                }
                current.labels = data.labels;
                chart.update();
            }
            None => {
                self.chart = Some(self.surface.create_chart(line_chart_config(data)));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::{Cell, RefCell};
    use std::collections::BTreeMap;
    use std::rc::Rc;

    use crate::chart::{ChartConfig, ChartData};
    use crate::models::{
        EndResponse, Reply, ResetResponse, StartResponse, StatsResponse,
    };

    #[derive(Default)]
    struct FakeApi {
        start_reply: RefCell<Option<Reply<StartResponse>>>,
        end_reply: RefCell<Option<Reply<EndResponse>>>,
        reset_reply: RefCell<Option<Reply<ResetResponse>>>,
        stats: RefCell<Vec<StatsResponse>>,
        calls: RefCell<Vec<String>>,
        offline: Cell<bool>,
    }

    impl FakeApi {
        fn offline_error() -> ClientError {
            ClientError::Status { status: 502 }
        }

        fn call(&self, name: &str) -> Result<(), ClientError> {
            self.calls.borrow_mut().push(name.to_string());
            if self.offline.get() {
                Err(Self::offline_error())
            } else {
                Ok(())
            }
        }
    }

    impl DelayApi for FakeApi {
        async fn start(&self, reason: Reason) -> Result<Reply<StartResponse>, ClientError> {
            self.call(&format!("start:{reason}"))?;
            Ok(self.start_reply.borrow_mut().take().unwrap())
        }

        async fn end(&self) -> Result<Reply<EndResponse>, ClientError> {
            self.call("end")?;
            Ok(self.end_reply.borrow_mut().take().unwrap())
        }

        async fn reset(&self, password: &str) -> Result<Reply<ResetResponse>, ClientError> {
            self.call(&format!("reset:{password}"))?;
            Ok(self.reset_reply.borrow_mut().take().unwrap())
        }

        async fn stats(&self) -> Result<StatsResponse, ClientError> {
            self.call("stats")?;
            Ok(self.stats.borrow_mut().remove(0))
        }

        async fn download(&self) -> Result<Download, ClientError> {
            self.call("download")?;
            Ok(Download {
                filename: "delay_data.csv".to_string(),
                bytes: b"ID\n".to_vec(),
            })
        }
    }

    struct FakeView {
        reason: Reason,
        alerts: Vec<String>,
        prompt_answer: Option<String>,
        prompts: usize,
        total: Option<String>,
        downloads: Vec<Download>,
    }

    impl FakeView {
        fn new() -> Self {
            Self {
                reason: Reason::OutBody,
                alerts: Vec::new(),
                prompt_answer: None,
                prompts: 0,
                total: None,
                downloads: Vec::new(),
            }
        }
    }

    impl PageView for FakeView {
        fn selected_reason(&self) -> Reason {
            self.reason
        }

        fn alert(&mut self, message: &str) {
            self.alerts.push(message.to_string());
        }

        async fn prompt(&mut self, _message: &str) -> Option<String> {
            self.prompts += 1;
            self.prompt_answer.clone()
        }

        fn set_total_minutes(&mut self, text: &str) {
            self.total = Some(text.to_string());
        }

        fn save_download(&mut self, download: Download) {
            self.downloads.push(download);
        }
    }

    #[derive(Default)]
    struct Drawn {
        created: usize,
        updates: usize,
        last: ChartData,
    }

    struct FakeChart {
        data: ChartData,
        drawn: Rc<RefCell<Drawn>>,
    }

    impl Chart for FakeChart {
        fn data_mut(&mut self) -> &mut ChartData {
            &mut self.data
        }

        fn update(&mut self) {
            let mut drawn = self.drawn.borrow_mut();
            drawn.updates += 1;
            drawn.last = self.data.clone();
        }
    }

    #[derive(Default)]
    struct FakeSurface {
        drawn: Rc<RefCell<Drawn>>,
        configs: Vec<ChartConfig>,
    }

    impl ChartSurface for FakeSurface {
        type Chart = FakeChart;

        fn create_chart(&mut self, config: ChartConfig) -> FakeChart {
            {
                let mut drawn = self.drawn.borrow_mut();
                drawn.created += 1;
                drawn.last = config.data.clone();
            }
            self.configs.push(config.clone());
            FakeChart {
                data: config.data,
                drawn: self.drawn.clone(),
            }
        }
    }

    fn controller(api: FakeApi) -> (PageController<FakeApi, FakeView, FakeSurface>, Rc<RefCell<Drawn>>) {
        let surface = FakeSurface::default();
        let drawn = surface.drawn.clone();
        (PageController::new(api, FakeView::new(), surface), drawn)
    }

    fn stats(days: Vec<(&str, Vec<(&str, f64)>)>, total: f64) -> StatsResponse {
        let mut daily_stats = BTreeMap::new();
        for (date, values) in days {
            daily_stats.insert(
                date.to_string(),
                values.into_iter().map(|(k, v)| (k.to_string(), v)).collect(),
            );
        }
        StatsResponse {
            daily_stats,
            total_duration_minutes: total,
        }
    }

    #[tokio::test]
    async fn test_start_success_shows_confirmation() {
        let api = FakeApi::default();
        *api.start_reply.borrow_mut() = Some(Reply::Success(StartResponse {
            message: "Delay started".to_string(),
            event_id: 1,
        }));
        let (mut page, _) = controller(api);
        page.view_mut().reason = Reason::OutOfTwoDotBattery;

        page.start_delay().await;

        assert_eq!(page.view().alerts, vec!["Delay started!"]);
        assert_eq!(
            *page.api.calls.borrow(),
            vec!["start:out of 2 dot battery".to_string()]
        );
    }

    #[tokio::test]
    async fn test_errors_shown_verbatim() {
        let api = FakeApi::default();
        *api.start_reply.borrow_mut() = Some(Reply::Failure { error: "X".to_string() });
        *api.end_reply.borrow_mut() = Some(Reply::Failure { error: "X".to_string() });
        *api.reset_reply.borrow_mut() = Some(Reply::Failure { error: "X".to_string() });
        let (mut page, drawn) = controller(api);
        page.view_mut().prompt_answer = Some("pw".to_string());

        page.start_delay().await;
        page.end_delay().await;
        page.reset_data().await;

        assert_eq!(page.view().alerts, vec!["X", "X", "X"]);
        // a failed reset must not refresh the chart
        assert!(!page.api.calls.borrow().contains(&"stats".to_string()));
        assert_eq!(drawn.borrow().created, 0);
    }

    #[tokio::test]
    async fn test_end_rounds_duration_to_two_decimals() {
        let api = FakeApi::default();
        *api.end_reply.borrow_mut() = Some(Reply::Success(EndResponse {
            message: "Delay ended".to_string(),
            event_id: 4,
            duration_minutes: 12.345,
        }));
        let (mut page, _) = controller(api);

        page.end_delay().await;

        assert_eq!(page.view().alerts.len(), 1);
        assert!(page.view().alerts[0].contains("12.35"));
        assert_eq!(page.view().alerts[0], "Delay ended! Duration: 12.35 minutes");
    }

    #[tokio::test]
    async fn test_reset_cancelled_sends_nothing() {
        let (mut page, _) = controller(FakeApi::default());

        page.view_mut().prompt_answer = None;
        page.reset_data().await;
        page.view_mut().prompt_answer = Some(String::new());
        page.reset_data().await;

        assert_eq!(page.view().prompts, 2);
        assert!(page.api.calls.borrow().is_empty());
        assert!(page.view().alerts.is_empty());
    }

    #[tokio::test]
    async fn test_reset_success_refreshes_chart() {
        let api = FakeApi::default();
        *api.reset_reply.borrow_mut() = Some(Reply::Success(ResetResponse {
            message: "Reset successful, deleted 3 events.".to_string(),
        }));
        api.stats.borrow_mut().push(stats(vec![], 0.0));
        let (mut page, drawn) = controller(api);
        page.view_mut().prompt_answer = Some("s3cret".to_string());

        page.reset_data().await;

        assert_eq!(page.view().alerts, vec!["Reset successful, deleted 3 events."]);
        assert_eq!(
            *page.api.calls.borrow(),
            vec!["reset:s3cret".to_string(), "stats".to_string()]
        );
        assert_eq!(drawn.borrow().created, 1);
        assert_eq!(page.view().total.as_deref(), Some("0.00"));
    }

    #[tokio::test]
    async fn test_refresh_fills_missing_reasons_with_zero() {
        let api = FakeApi::default();
        api.stats.borrow_mut().push(stats(
            vec![
                ("2024-03-02", vec![("out body", 2.0)]),
                ("2024-03-01", vec![("out of 3 dot battery", 4.5)]),
            ],
            6.5,
        ));
        let (mut page, drawn) = controller(api);

        page.refresh_stats().await;

        let drawn = drawn.borrow();
        assert_eq!(drawn.last.labels, vec!["2024-03-01", "2024-03-02"]);
        assert_eq!(drawn.last.datasets[0].data, vec![0.0, 2.0]);
        assert_eq!(drawn.last.datasets[1].data, vec![0.0, 0.0]);
        assert_eq!(drawn.last.datasets[3].data, vec![4.5, 0.0]);
        assert_eq!(page.view().total.as_deref(), Some("6.50"));

        let config = &page.surface.configs[0];
        assert_eq!(config.x_title, "Date");
        assert_eq!(config.y_title, "Delay Duration (minutes)");
    }

    #[tokio::test]
    async fn test_refresh_reuses_chart() {
        let api = FakeApi::default();
        api.stats.borrow_mut().push(stats(vec![("2024-03-01", vec![("out body", 1.0)])], 1.0));
        api.stats.borrow_mut().push(stats(
            vec![
                ("2024-03-01", vec![("out body", 1.0)]),
                ("2024-03-02", vec![("out 1-dot battery", 3.0)]),
            ],
            4.0,
        ));
        api.stats.borrow_mut().push(stats(vec![], 0.0));
        let (mut page, drawn) = controller(api);

        page.refresh_stats().await;
        assert!(page.chart.is_some());
        page.refresh_stats().await;
        {
            let drawn = drawn.borrow();
            assert_eq!(drawn.created, 1);
            assert_eq!(drawn.updates, 1);
            assert_eq!(drawn.last.labels, vec!["2024-03-01", "2024-03-02"]);
            assert_eq!(drawn.last.datasets[1].data, vec![0.0, 3.0]);
            assert_eq!(drawn.last.datasets[1].label, "out 1-dot battery");
        }

        page.refresh_stats().await;
        let drawn = drawn.borrow();
        assert_eq!(drawn.created, 1);
        assert_eq!(drawn.updates, 2);
        assert!(drawn.last.labels.is_empty());
        assert!(drawn.last.datasets.iter().all(|s| s.data.is_empty()));
    }

    #[tokio::test]
    async fn test_transport_failure_is_reported() {
        let api = FakeApi::default();
        api.offline.set(true);
        let (mut page, drawn) = controller(api);
        page.view_mut().prompt_answer = Some("pw".to_string());

        page.start_delay().await;
        page.end_delay().await;
        page.reset_data().await;
        page.refresh_stats().await;
        page.download_report().await;

        assert_eq!(page.view().alerts.len(), 5);
        assert!(page.view().alerts.iter().all(|a| a.starts_with("Request failed:")));
        assert!(!page.chart.is_some());
        assert_eq!(drawn.borrow().created, 0);
        assert_eq!(page.view().total, None);
    }

    #[tokio::test]
    async fn test_download_hands_file_to_view() {
        let (mut page, _) = controller(FakeApi::default());

        page.download_report().await;

        assert_eq!(page.view().downloads.len(), 1);
        assert_eq!(page.view().downloads[0].filename, "delay_data.csv");
        assert!(page.view().alerts.is_empty());
    }
}
