#![allow(non_snake_case)]
use metrics_cloudwatch_powertools::{Builder, Error, InvocationContext, MetricUnit};
use tracing::info;

struct Request {
    request_id: String,
    items: u32,
}

fn function_handler(metrics: &mut metrics_cloudwatch_powertools::Collector, event: &Request) -> Result<String, Error> {
    info!("Handling {}", event.request_id);

    metrics.add_metric("requests", MetricUnit::Count, 1)?;
    metrics.add_metric("items", MetricUnit::Count, event.items)?;
    metrics.add_dimension("Method", "Default");

    Ok(event.request_id.clone())
}

fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::filter::EnvFilter::from_default_env())
        .with_target(false)
        .without_time()
        .compact()
        .init();

    let function_name = std::env::var("AWS_LAMBDA_FUNCTION_NAME").unwrap_or_else(|_| "MetricsTest".to_string());

    let mut metrics = Builder::new()
        .cloudwatch_namespace("MetricsTest")
        .capture_cold_start_metric(true)
        .with_request_id_metadata("RequestId")
        .init();

    // Two warm invocations of the same process, only the first one reports a cold start
    for (request_id, items) in [("4bd2d365-3792-46c8-9b6c-6132f9630fbb", 3), ("9c1e4b40-0d4b-4bb5-8f65-1e0f7a0bdf51", 5)] {
        let context = InvocationContext::new(function_name.as_str()).with_request_id(request_id);
        let event = Request {
            request_id: request_id.to_string(),
            items,
        };
        let response = metrics.log_metrics(&context, |metrics| function_handler(metrics, &event))?;
        info!("Responded to {response}");
    }

    Ok(())
}
