#[macro_use]
extern crate rocket;

use rocket::fairing::{AdHoc, Fairing, Info, Kind};
use rocket::http::Header;
use rocket::{Request, Response};

use dotenvy::dotenv;
use mongodb::Database;
use tracing_subscriber::EnvFilter;

use unievent::checkin::ticket::TicketKeys;
use unievent::config::Config;
use unievent::db::init_db;
use unievent::jobs;
use unievent::push::PushClient;
use unievent::routes::{admin, organizer, public};

pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, PATCH, OPTIONS, PUT, DELETE",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
        response.set_header(Header::new("Access-Control-Allow-Credentials", "true"));
    }
}

#[launch]
async fn rocket() -> _ {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let config = Config::from_env();
    let db = init_db(&config).await;
    let ticket_keys = TicketKeys::new(&config.ticket_secret);
    let push = PushClient::new(&config.push_endpoint);

    rocket::build()
        .manage(config)
        .manage(db)
        .manage(ticket_keys)
        .manage(push)
        .attach(Cors)
        .attach(AdHoc::on_liftoff("background sweeps", |rocket| {
            Box::pin(async move {
                let db = rocket
                    .state::<Database>()
                    .expect("database state")
                    .clone();
                let push = rocket
                    .state::<PushClient>()
                    .expect("push client state")
                    .clone();
                jobs::spawn_all(db, push);
            })
        }))
        .mount("/api", public::routes())
        .mount("/api/organizer", organizer::routes())
        .mount("/api/admin", admin::routes())
}
