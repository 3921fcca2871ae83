#[macro_use]
extern crate human_panic;

use anyhow::{bail, Result};
use clap::{App, Arg};
use dotenv::dotenv;
use log::LevelFilter;
use soxide::{DirectConnector, SocksServer};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    let args = App::new("soxide")
        .version("0.1.0")
        .about("A SOCKS4/4a/5 proxy server")
        .arg(
            Arg::new("DEBUG")
                .short('d')
                .long("debug")
                .help("Prints debug information verbosely"),
        )
        .arg(
            Arg::new("PORT")
                .short('p')
                .long("port")
                .help("Port to use")
                .default_value("1080"),
        )
        .arg(
            Arg::new("CONN_LIMIT")
                .long("connections-limit")
                .help("Concurrent connections limit (0=unlimited)")
                .default_value("0"),
        )
        .arg(
            Arg::new("AUTH")
                .short('a')
                .long("auth")
                .help("Require authentication with a user:pass entry")
                .multiple(true)
                .takes_value(true),
        )
        .get_matches();

    let mut logger = env_logger::builder();
    logger.format_module_path(false);

    if args.is_present("DEBUG") {
        logger.filter_level(LevelFilter::Debug).init();
    } else {
        logger.filter_level(LevelFilter::Info).init();

        setup_panic!(Metadata {
            name: "soxide".into(),
            version: env!("CARGO_PKG_VERSION").into(),
            authors: env!("CARGO_PKG_AUTHORS").replace(":", ", ").into(),
            homepage: env!("CARGO_PKG_HOMEPAGE").into(),
        });
    }

    let mut credentials = HashMap::new();
    if let Some(entries) = args.values_of("AUTH") {
        for entry in entries {
            match entry.split_once(':') {
                Some((username, password)) => {
                    credentials.insert(username.to_string(), password.to_string());
                }
                None => bail!("Invalid auth entry (expected user:pass): {}", entry),
            }
        }
    }

    let connector = Arc::new(DirectConnector);
    let server = if credentials.is_empty() {
        SocksServer::new(connector)
    } else {
        SocksServer::with_auth(connector, credentials)
    };
    let server = Arc::new(server);

    let conn_limit = args.value_of("CONN_LIMIT").unwrap();
    let semaphore = if conn_limit != "0" {
        Some(Arc::new(Semaphore::new(conn_limit.parse()?)))
    } else {
        None
    };

    let port = args.value_of("PORT").unwrap();
    let listener = TcpListener::bind(format!("0.0.0.0:{}", port)).await?;

    loop {
        let (incoming, peer) = listener.accept().await?;

        let server = Arc::clone(&server);
        let semaphore = semaphore.clone();

        tokio::spawn(process(incoming, peer, server, semaphore));
    }
}

async fn process(
    incoming: TcpStream,
    peer: SocketAddr,
    server: Arc<SocksServer>,
    semaphore: Option<Arc<Semaphore>>,
) -> Result<()> {
    let mut incoming = incoming;

    if let Some(semaphore) = semaphore {
        let permit = semaphore.try_acquire();
        if permit.is_ok() {
            server.handle_connection(&mut incoming, Some(peer)).await?;
        } else {
            server.refuse_connection(&mut incoming).await?;
        }
    } else {
        server.handle_connection(&mut incoming, Some(peer)).await?;
    }

    Ok(())
}
