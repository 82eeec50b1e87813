use prometheus::{Encoder, IntCounter, IntGauge, Registry, TextEncoder};

#[derive(Clone)]
pub struct TelemetryMetrics {
    pub ingested_frames: IntCounter,
    pub decode_failures: IntCounter,
    pub known_devices: IntGauge,
}

#[derive(Clone)]
pub struct MetricsHub {
    pub registry: Registry,
    pub telemetry: TelemetryMetrics,
}

impl MetricsHub {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();
        let telemetry = TelemetryMetrics {
            ingested_frames: IntCounter::new(
                "pdo_ingested_frames",
                "Process-data frames decoded and published",
            )?,
            decode_failures: IntCounter::new(
                "pdo_decode_failures",
                "Process-data frames rejected by the decoder",
            )?,
            known_devices: IntGauge::new(
                "pdo_known_devices",
                "Devices with at least one published record",
            )?,
        };
        registry.register(Box::new(telemetry.ingested_frames.clone()))?;
        registry.register(Box::new(telemetry.decode_failures.clone()))?;
        registry.register(Box::new(telemetry.known_devices.clone()))?;
        Ok(Self {
            registry,
            telemetry,
        })
    }

    pub fn encode_text(&self) -> String {
        let mut buf = Vec::new();
        let encoder = TextEncoder::new();
        if let Err(e) = encoder.encode(&self.registry.gather(), &mut buf) {
            return format!("error encoding metrics: {e}");
        }
        String::from_utf8(buf).unwrap_or_default()
    }
}
