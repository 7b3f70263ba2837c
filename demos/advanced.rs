//! Advanced Circuit Breaker Example
//!
//! This example demonstrates:
//! 1. Using hooks for monitoring circuit breaker events
//! 2. Distinguishing timeouts from operation errors
//! 3. Cancelling in-flight calls from the caller side
//! 4. Structured logging of state transitions with tracing

use breakwater::{BreakerError, CircuitBreaker, DefaultPolicy, HookRegistry};
use std::error::Error;
use std::fmt;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

// Custom error type that implements Error trait
#[derive(Debug)]
struct ServiceError(String);

impl ServiceError {
    fn new(msg: &str) -> Self {
        ServiceError(msg.to_string())
    }
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Service error: {}", self.0)
    }
}

impl Error for ServiceError {}

// Simulates a dependency that is slow, then broken, then healthy again
async fn external_service_call(
    ctx: CancellationToken,
    attempt: u32,
) -> Result<String, ServiceError> {
    match attempt {
        1..=3 => Ok("Initial success".to_string()),
        4 => {
            // Way slower than the breaker timeout; give up once abandoned
            tokio::select! {
                _ = ctx.cancelled() => Err(ServiceError::new("abandoned")),
                _ = tokio::time::sleep(Duration::from_secs(10)) => Ok("Too late".to_string()),
            }
        }
        5..=8 => Err(ServiceError::new("Service temporarily unavailable")),
        _ => Ok("Stable success".to_string()),
    }
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .init();

    println!("=== Advanced Circuit Breaker Example ===\n");

    // 1. Set up a hook registry for observability
    let hooks = HookRegistry::new();

    hooks.set_on_open(|| println!("Circuit OPENED due to too many failures"));
    hooks.set_on_close(|| println!("Circuit CLOSED after successful recovery"));
    hooks.set_on_half_open(|| println!("Circuit HALF-OPEN, testing if service recovered"));
    hooks.set_on_rejected(|| println!("Call rejected, circuit open"));

    // 2. Create a circuit breaker with advanced configuration
    let breaker = CircuitBreaker::<DefaultPolicy, ServiceError>::builder()
        .timeout(Duration::from_millis(500))
        .recover_timeout(Duration::from_secs(2))
        .error_threshold(20.0)
        .half_open_limit(2)
        .window_size(20)
        .hooks(hooks)
        .build();

    println!("Initial state: {:?}\n", breaker.current_state());

    let ctx = CancellationToken::new();

    // 3. Simulate a series of calls to demonstrate the circuit breaker behavior
    for attempt in 1..=15 {
        println!("\n--- Call {} ---", attempt);

        match breaker.execute(&ctx, attempt, external_service_call).await {
            Ok(response) => println!("Service response: {}", response),
            Err(BreakerError::Open) => println!("Circuit open, call not attempted"),
            Err(BreakerError::Timeout(after)) => {
                println!("Service too slow, gave up after {:?}", after)
            }
            Err(BreakerError::Operation(err)) => println!("Service error: {}", err),
            Err(err) => println!("Other error: {}", err),
        }

        println!(
            "Circuit metrics: state={:?}, error_rate={:.2}%",
            breaker.current_state(),
            breaker.error_rate()
        );

        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    // 4. Cancelling the caller's token aborts an in-flight call
    let caller = CancellationToken::new();
    let canceller = caller.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });
    if let Err(err) = breaker.execute(&caller, 4, external_service_call).await {
        println!("\nCancelled call: {}", err);
    }

    println!("\n=== Example Completed ===");
}
