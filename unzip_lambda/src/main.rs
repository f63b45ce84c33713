use aws_config::BehaviorVersion;
use aws_sdk_s3::Client as S3Client;
use lambda_runtime::{run, service_fn, tracing, Error};
mod archive;
mod config;
mod error;
mod event_handler;
mod keys;
mod storage;
use event_handler::function_handler;
use storage::S3Storage;

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing::subscriber::fmt().json().init();
    let shared_config = aws_config::load_defaults(BehaviorVersion::latest()).await;
    let storage = S3Storage::new(S3Client::new(&shared_config));
    run(service_fn(|event| function_handler(event, &storage))).await
}
