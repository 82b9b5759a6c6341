//! TMDB client tests against a mock HTTP server, plus the pure
//! best-match selection rule.

use mockito::Matcher;
use serde_json::json;
use watchscrape::metadata::client::best_match;
use watchscrape::metadata::types::SearchHit;
use watchscrape::metadata::TmdbClient;
use watchscrape::model::TitleKind;

fn hit(id: u64, title: &str, date: &str, popularity: f64) -> SearchHit {
    serde_json::from_value(json!({
        "id": id,
        "title": title,
        "release_date": date,
        "popularity": popularity,
    }))
    .expect("valid search hit")
}

#[test]
fn best_match_prefers_closest_year() {
    let candidates = vec![
        (hit(1, "Heat", "1972-01-01", 50.0), TitleKind::Movie),
        (hit(2, "Heat", "1995-12-15", 10.0), TitleKind::Movie),
        (hit(3, "Heat", "2013-06-01", 80.0), TitleKind::Movie),
    ];

    let (chosen, _) = best_match(candidates, Some(1995)).expect("a match");
    assert_eq!(chosen.id, 2);
}

#[test]
fn best_match_breaks_year_ties_by_popularity() {
    let candidates = vec![
        (hit(1, "Twin", "2000-03-01", 5.0), TitleKind::Movie),
        (hit(2, "Twin", "2000-09-01", 25.0), TitleKind::Movie),
    ];

    let (chosen, _) = best_match(candidates, Some(2000)).expect("a match");
    assert_eq!(chosen.id, 2);
}

#[test]
fn best_match_without_year_takes_highest_popularity() {
    let candidates = vec![
        (hit(1, "Solaris", "1972-03-20", 30.0), TitleKind::Movie),
        (hit(2, "Solaris", "2002-11-27", 45.0), TitleKind::Movie),
    ];

    let (chosen, _) = best_match(candidates, None).expect("a match");
    assert_eq!(chosen.id, 2);
}

#[test]
fn best_match_undated_candidates_lose_to_dated_ones() {
    let undated: SearchHit = serde_json::from_value(json!({
        "id": 1,
        "title": "Mystery",
        "popularity": 99.0,
    }))
    .expect("valid hit");
    let candidates = vec![
        (undated, TitleKind::Movie),
        (hit(2, "Mystery", "1998-01-01", 1.0), TitleKind::Movie),
    ];

    let (chosen, _) = best_match(candidates, Some(1997)).expect("a match");
    assert_eq!(chosen.id, 2);
}

#[test]
fn best_match_empty_is_none() {
    assert!(best_match(Vec::new(), Some(2000)).is_none());
}

#[tokio::test]
async fn search_hits_parse_and_carry_the_year_parameter() {
    let mut server = mockito::Server::new_async().await;

    let movie_mock = server
        .mock("GET", "/search/movie")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("api_key".into(), "test-key".into()),
            Matcher::UrlEncoded("query".into(), "The Pianist".into()),
            Matcher::UrlEncoded("year".into(), "2002".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "results": [{
                    "id": 423,
                    "title": "The Pianist",
                    "poster_path": "/abc123.jpg",
                    "release_date": "2002-09-17",
                    "vote_average": 8.4,
                    "vote_count": 9000,
                    "popularity": 44.5
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = TmdbClient::with_bases("test-key", 1000.0, server.url(), "https://img.test");
    let hits = client
        .search(TitleKind::Movie, "The Pianist", Some("2002"))
        .await
        .expect("search succeeds");

    movie_mock.assert_async().await;
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, 423);
    assert_eq!(hits[0].release_year(), Some(2002));
    assert_eq!(client.poster_url("/abc123.jpg"), "https://img.test/w342/abc123.jpg");
}

#[tokio::test]
async fn tv_search_uses_first_air_date_year() {
    let mut server = mockito::Server::new_async().await;

    let tv_mock = server
        .mock("GET", "/search/tv")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("query".into(), "Westworld".into()),
            Matcher::UrlEncoded("first_air_date_year".into(), "2016".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(
            json!({
                "results": [{
                    "id": 63247,
                    "name": "Westworld",
                    "first_air_date": "2016-10-02",
                    "popularity": 120.0
                }]
            })
            .to_string(),
        )
        .create_async()
        .await;

    let client = TmdbClient::with_bases("test-key", 1000.0, server.url(), "https://img.test");
    let hits = client
        .search(TitleKind::Series, "Westworld", Some("2016"))
        .await
        .expect("search succeeds");

    tv_mock.assert_async().await;
    assert_eq!(hits[0].release_year(), Some(2016));
}

#[tokio::test]
async fn runtime_comes_from_the_detail_endpoints() {
    let mut server = mockito::Server::new_async().await;

    let movie_detail = server
        .mock("GET", "/movie/423")
        .match_query(Matcher::UrlEncoded("api_key".into(), "test-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "runtime": 150 }).to_string())
        .create_async()
        .await;

    let tv_detail = server
        .mock("GET", "/tv/63247")
        .match_query(Matcher::UrlEncoded("api_key".into(), "test-key".into()))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(json!({ "episode_run_time": [60, 90] }).to_string())
        .create_async()
        .await;

    let client = TmdbClient::with_bases("test-key", 1000.0, server.url(), "https://img.test");

    let movie_runtime = client
        .runtime_minutes(TitleKind::Movie, 423)
        .await
        .expect("detail succeeds");
    assert_eq!(movie_runtime, Some(150));

    let tv_runtime = client
        .runtime_minutes(TitleKind::Series, 63247)
        .await
        .expect("detail succeeds");
    assert_eq!(tv_runtime, Some(60));

    movie_detail.assert_async().await;
    tv_detail.assert_async().await;
}

#[tokio::test]
async fn upstream_errors_surface_as_metadata_errors() {
    let mut server = mockito::Server::new_async().await;

    server
        .mock("GET", "/search/movie")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("upstream exploded")
        .create_async()
        .await;

    let client = TmdbClient::with_bases("test-key", 1000.0, server.url(), "https://img.test");
    let result = client.search(TitleKind::Movie, "Anything", None).await;

    assert!(matches!(
        result,
        Err(watchscrape::ScrapeError::Metadata(_))
    ));
}
