use crate::config::{AppConfig, PlotConfig};
use crate::error::{FieldError, Result};
use crate::field::MagneticField;
use crate::form;
use crate::grid::Grid;
use crate::streamlines;
use crate::visualisation::FieldLinePlotter;
use std::collections::HashMap;
use std::convert::Infallible;
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use warp::http::{header, StatusCode};
use warp::{Filter, Rejection, Reply};

const INDEX_HTML: &str = include_str!("../templates/index.html");
const MAX_FORM_BYTES: u64 = 64 * 1024;

#[derive(Debug)]
struct PlotFailed(FieldError);

impl warp::reject::Reject for PlotFailed {}

/// Parses the submitted wires and renders their field lines as PNG bytes.
pub fn render_plot(style: &PlotConfig, form: &HashMap<String, String>) -> Result<Vec<u8>> {
    let sources = form::parse_sources(form);
    let grid = Grid::from_sources(&sources, style.resolution, style.padding)?;
    debug!(
        sources = sources.len(),
        x_min = grid.x_min,
        x_max = grid.x_max,
        y_min = grid.y_min,
        y_max = grid.y_max,
        "grid resolved"
    );

    let field = MagneticField::solve(&grid, &sources)?;
    let singular = field.non_finite_count();
    if singular > 0 {
        debug!(samples = singular, "wire coincides with grid samples");
    }

    let lines = streamlines::trace(&grid, &field, style.density);
    debug!(lines = lines.len(), "field lines traced");

    let plotter = FieldLinePlotter::new(style);
    let (width, height) = plotter.figure_size(&grid);
    let png = plotter.render_png(&grid, &lines)?;
    info!(
        sources = sources.len(),
        width,
        height,
        bytes = png.len(),
        "rendered field plot"
    );
    Ok(png)
}

fn with_config(
    config: Arc<AppConfig>,
) -> impl Filter<Extract = (Arc<AppConfig>,), Error = Infallible> + Clone {
    warp::any().map(move || config.clone())
}

/// `GET /` landing page and `POST /get_plot`, with permissive CORS.
pub fn routes(config: Arc<AppConfig>) -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
    let index = warp::path::end()
        .and(warp::get())
        .map(|| warp::reply::html(INDEX_HTML));

    let plot = warp::path("get_plot")
        .and(warp::path::end())
        .and(warp::post())
        .and(warp::body::content_length_limit(MAX_FORM_BYTES))
        .and(warp::body::form())
        .and(with_config(config))
        .and_then(get_plot);

    let cors = warp::cors()
        .allow_any_origin()
        .allow_methods(vec!["GET", "POST"])
        .allow_headers(vec!["content-type"]);

    index
        .or(plot)
        .recover(handle_rejection)
        .with(cors)
        .with(warp::log::custom(log_request))
}

async fn get_plot(
    pairs: Vec<(String, String)>,
    config: Arc<AppConfig>,
) -> std::result::Result<impl Reply, Rejection> {
    let form = form::first_values(pairs);
    let png = tokio::task::spawn_blocking(move || render_plot(&config.plot, &form))
        .await
        .map_err(|e| warp::reject::custom(PlotFailed(FieldError::Render(e.to_string()))))?
        .map_err(|e| warp::reject::custom(PlotFailed(e)))?;

    Ok(warp::reply::with_header(png, header::CONTENT_TYPE, "image/png"))
}

async fn handle_rejection(err: Rejection) -> std::result::Result<impl Reply, Infallible> {
    let (status, message) = if err.is_not_found() {
        (StatusCode::NOT_FOUND, "Not Found")
    } else if let Some(PlotFailed(e)) = err.find::<PlotFailed>() {
        error!(error = %e, "failed to render plot");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "Method Not Allowed")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "Payload Too Large")
    } else if err.find::<warp::reject::UnsupportedMediaType>().is_some() {
        (StatusCode::UNSUPPORTED_MEDIA_TYPE, "Unsupported Media Type")
    } else {
        warn!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error")
    };

    Ok(warp::reply::with_status(message, status))
}

fn log_request(info: warp::log::Info<'_>) {
    info!(
        method = %info.method(),
        path = info.path(),
        status = info.status().as_u16(),
        elapsed_ms = info.elapsed().as_millis() as u64,
        "request"
    );
}

/// Binds the configured address and serves until Ctrl-C.
pub async fn serve(config: AppConfig) -> anyhow::Result<()> {
    let addr = config.server.socket_addr()?;
    let (bound, server) = warp::serve(routes(Arc::new(config)))
        .try_bind_with_graceful_shutdown(addr, async {
            let _ = tokio::signal::ctrl_c().await;
        })?;

    info!(addr = %bound, "listening");
    server.await;
    info!("shut down");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_SIGNATURE: [u8; 8] = [0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
    const FORM: &str = "application/x-www-form-urlencoded";

    fn api() -> impl Filter<Extract = impl Reply, Error = Rejection> + Clone {
        routes(Arc::new(AppConfig::default()))
    }

    #[tokio::test]
    async fn index_serves_html() {
        let res = warp::test::request().method("GET").path("/").reply(&api()).await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers()["content-type"]
            .to_str()
            .unwrap()
            .starts_with("text/html"));
        assert!(std::str::from_utf8(res.body()).unwrap().contains("get_plot"));
    }

    #[tokio::test]
    async fn single_wire_returns_png() {
        let res = warp::test::request()
            .method("POST")
            .path("/get_plot")
            .header("content-type", FORM)
            .body("current1=1&x_position1=0&y_position1=0")
            .reply(&api())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert_eq!(res.headers()["content-type"], "image/png");
        assert_eq!(&res.body()[..8], &PNG_SIGNATURE);
    }

    #[tokio::test]
    async fn trailing_invalid_triple_is_ignored() {
        let res = warp::test::request()
            .method("POST")
            .path("/get_plot")
            .header("content-type", FORM)
            .body("current1=1&x_position1=3&y_position1=4&current2=oops&x_position2=1&y_position2=1")
            .reply(&api())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let decoded = image::load_from_memory(res.body()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (500, 600));
    }

    #[tokio::test]
    async fn empty_form_is_a_server_error() {
        let res = warp::test::request()
            .method("POST")
            .path("/get_plot")
            .header("content-type", FORM)
            .body("")
            .reply(&api())
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn unknown_path_is_not_found() {
        let res = warp::test::request().method("GET").path("/nope").reply(&api()).await;
        assert_eq!(res.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn plot_endpoint_requires_post() {
        let res = warp::test::request().method("GET").path("/get_plot").reply(&api()).await;
        assert_eq!(res.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn cross_origin_requests_are_allowed() {
        let res = warp::test::request()
            .method("POST")
            .path("/get_plot")
            .header("origin", "http://example.com")
            .header("content-type", FORM)
            .body("current1=-2&x_position1=1&y_position1=1")
            .reply(&api())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        assert!(res.headers().contains_key("access-control-allow-origin"));
    }

    #[tokio::test]
    async fn repeated_field_uses_first_value() {
        let res = warp::test::request()
            .method("POST")
            .path("/get_plot")
            .header("content-type", FORM)
            .body("current1=1&x_position1=3&y_position1=0&x_position1=0")
            .reply(&api())
            .await;
        assert_eq!(res.status(), StatusCode::OK);
        let decoded = image::load_from_memory(res.body()).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (500, 200));
    }

    #[tokio::test]
    async fn overflowing_position_is_a_server_error() {
        let res = warp::test::request()
            .method("POST")
            .path("/get_plot")
            .header("content-type", FORM)
            .body("current1=1&x_position1=1e308&y_position1=0")
            .reply(&api())
            .await;
        assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[tokio::test]
    async fn nan_values_are_a_server_error() {
        for body in [
            "current1=1&x_position1=nan&y_position1=0",
            "current1=nan&x_position1=0&y_position1=0",
        ] {
            let res = warp::test::request()
                .method("POST")
                .path("/get_plot")
                .header("content-type", FORM)
                .body(body)
                .reply(&api())
                .await;
            assert_eq!(res.status(), StatusCode::INTERNAL_SERVER_ERROR, "{}", body);
        }
    }

    #[test]
    fn render_plot_rejects_empty_form() {
        let err = render_plot(&PlotConfig::default(), &HashMap::new()).unwrap_err();
        assert!(matches!(err, FieldError::NoSources));
    }

    #[test]
    fn render_plot_accepts_coincident_wires() {
        let form: HashMap<String, String> = [
            ("current1", "1"),
            ("x_position1", "0.5"),
            ("y_position1", "0.5"),
            ("current2", "-1"),
            ("x_position2", "0.5"),
            ("y_position2", "0.5"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        let png = render_plot(&PlotConfig::default(), &form).unwrap();
        assert_eq!(&png[..8], &PNG_SIGNATURE);
    }
}
