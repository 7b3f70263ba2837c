use breakwater::{BreakerError, CircuitBreaker, DefaultPolicy};
use std::error::Error;
use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// Custom error type that implements Error trait
#[derive(Debug)]
struct ServiceError(String);

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// Fails on even calls for the first ten calls, then recovers
async fn call_service(
    _ctx: CancellationToken,
    counter: Arc<AtomicU32>,
) -> Result<String, ServiceError> {
    let count = counter.fetch_add(1, Ordering::SeqCst) + 1;
    tokio::time::sleep(Duration::from_millis(50)).await;

    if count <= 10 && count % 2 == 0 {
        Err(ServiceError("External service error".to_string()))
    } else {
        Ok("Success".to_string())
    }
}

#[tokio::main]
async fn main() {
    let breaker = CircuitBreaker::<DefaultPolicy, ServiceError>::builder()
        .timeout(Duration::from_secs(1)) // Give each call one second
        .error_threshold(50.0) // 50% failure rate will trip circuit
        .recover_timeout(Duration::from_secs(2)) // 2 second cooldown period
        .half_open_limit(2) // 2 successes close the circuit again
        .build();

    println!("Circuit initial state: {:?}", breaker.current_state());

    let ctx = CancellationToken::new();
    let counter = Arc::new(AtomicU32::new(0));

    for i in 1..=15 {
        println!("\nAttempt {}: ", i);

        match breaker.execute(&ctx, counter.clone(), call_service).await {
            Ok(result) => println!("Call succeeded with result: {}", result),
            Err(BreakerError::Open) => {
                println!("Circuit is open, waiting before retry...");
                tokio::time::sleep(Duration::from_secs(1)).await;
            }
            Err(BreakerError::Operation(err)) => {
                println!("Call failed with error: {}", err);
            }
            Err(err) => println!("Other error: {}", err),
        }

        println!(
            "Current state: {:?}, Error rate: {:.2}%",
            breaker.current_state(),
            breaker.error_rate()
        );

        tokio::time::sleep(Duration::from_millis(300)).await;
    }
}
