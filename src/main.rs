use fbconnect::{params, ApiCall, ClientConfig, FacebookClient};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    // FACEBOOK_API_KEY / FACEBOOK_APP_SECRET / FACEBOOK_SESSION_KEY / ...
    // Without an API key the public test application is used.
    #[cfg(feature = "env-file")]
    let config = ClientConfig::from_env_file("facebook")?;
    #[cfg(not(feature = "env-file"))]
    let config = ClientConfig::from_env("facebook")?;

    let client = FacebookClient::new(config)?;
    let query = params([("query", "SELECT name FROM user WHERE uid = 1160")]);

    println!("Running fql.query inline...");
    match client.call("fql.query", &query).await {
        Ok(result) => println!("Result: {}", result),
        Err(e) => println!("Error: {}", e),
    }

    println!("Running fql.query in the background...");
    let response = client
        .api(
            ApiCall::method("fql.query")
                .params(&query)
                .payload(47_u32)
                .on_success(|result, session, payload| {
                    println!(
                        "Background result for {}: {} (payload {:?})",
                        session.api_key, result, payload
                    );
                })
                .on_failure(|error, _session, _payload| {
                    println!("Background call failed: {}", error);
                }),
        )
        .await?;

    if let Some(pending) = response.into_pending() {
        pending.wait().await?;
    }

    Ok(())
}
