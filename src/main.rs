use actix_web::{web, App, HttpServer};
use env_logger::Builder;
use log::{info, LevelFilter};

use chirp::config::Config;
use chirp::{db, handlers};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    Builder::new()
        .filter_level(LevelFilter::Debug)
        .format_timestamp_secs()
        .init();

    let config = Config::from_env();
    info!("Starting chirp backend...");

    let pool = db::create_pool(&config.database_path, config.pool_size)
        .expect("Failed to create database pool");
    db::init_schema(&pool.get().expect("Failed to acquire database connection"))
        .expect("Failed to initialize database schema");

    info!("Database ready at {}", config.database_path);

    let bind_addr = config.bind_addr.clone();
    let pool = web::Data::new(pool);
    let config = web::Data::new(config);

    info!("Listening on {}", bind_addr);
    HttpServer::new(move || {
        App::new()
            .app_data(pool.clone())
            .app_data(config.clone())
            .service(handlers::register_form)
            .service(handlers::register)
            .service(handlers::login_form)
            .service(handlers::login)
            .service(handlers::logout)
            .service(handlers::new_post_form)
            .service(handlers::create_post)
            .service(handlers::index)
            .service(handlers::network_stream)
            .service(handlers::user_stream)
            .service(handlers::view_post)
            .service(handlers::follow)
            .service(handlers::unfollow)
    })
    .workers(num_cpus::get())
    .bind(bind_addr)?
    .run()
    .await
}
