use prometheus::{
    Encoder, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder,
};

#[derive(Clone)]
pub struct Metrics {
    registry: Registry,
    pub deliveries_created_total: IntCounter,
    pub claims_total: IntCounterVec,
    pub claim_latency_seconds: HistogramVec,
    pub transitions_total: IntCounterVec,
    pub waiting_deliveries: IntGauge,
    pub couriers_available: IntGauge,
}

impl Metrics {
    pub fn new() -> Self {
        let registry = Registry::new();

        let deliveries_created_total = IntCounter::new(
            "deliveries_created_total",
            "Total deliveries created by businesses",
        )
        .expect("valid deliveries_created_total metric");

        let claims_total = IntCounterVec::new(
            Opts::new("claims_total", "Claim attempts by outcome"),
            &["outcome"],
        )
        .expect("valid claims_total metric");

        let claim_latency_seconds = HistogramVec::new(
            prometheus::HistogramOpts::new(
                "claim_latency_seconds",
                "Latency of claim arbitration in seconds",
            ),
            &["outcome"],
        )
        .expect("valid claim_latency_seconds metric");

        let transitions_total = IntCounterVec::new(
            Opts::new("transitions_total", "Lifecycle transitions by kind"),
            &["transition"],
        )
        .expect("valid transitions_total metric");

        let waiting_deliveries =
            IntGauge::new("waiting_deliveries", "Current number of waiting deliveries")
                .expect("valid waiting_deliveries metric");

        let couriers_available =
            IntGauge::new("couriers_available", "Current number of available couriers")
                .expect("valid couriers_available metric");

        registry
            .register(Box::new(deliveries_created_total.clone()))
            .expect("register deliveries_created_total");
        registry
            .register(Box::new(claims_total.clone()))
            .expect("register claims_total");
        registry
            .register(Box::new(claim_latency_seconds.clone()))
            .expect("register claim_latency_seconds");
        registry
            .register(Box::new(transitions_total.clone()))
            .expect("register transitions_total");
        registry
            .register(Box::new(waiting_deliveries.clone()))
            .expect("register waiting_deliveries");
        registry
            .register(Box::new(couriers_available.clone()))
            .expect("register couriers_available");

        Self {
            registry,
            deliveries_created_total,
            claims_total,
            claim_latency_seconds,
            transitions_total,
            waiting_deliveries,
            couriers_available,
        }
    }

    pub fn encode(&self) -> Result<String, String> {
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();

        TextEncoder::new()
            .encode(&metric_families, &mut buffer)
            .map_err(|err| format!("failed to encode metrics: {err}"))?;

        String::from_utf8(buffer).map_err(|err| format!("metrics are not valid utf8: {err}"))
    }
}
