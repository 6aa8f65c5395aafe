//! Bazarr API client.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Method, RequestBuilder, Response};
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::config::MediaServiceConfig;
use crate::json;
use crate::media::{normalize_subject_key, LanguageRequest, MediaKind, MediaRequest, MediaType};
use crate::throttle::parse_cadence;

use super::{
    MediaService, MediaServiceError, PostProcessSettings, SyncOptions, TextCleanupSettings,
};

const MOVIE_TASK_MARKERS: [&str; 3] = [
    "search for missing movies subtitles",
    "missing_subtitles_movies",
    "wanted_search_movie",
];
const SERIES_TASK_MARKERS: [&str; 3] = [
    "search for missing series subtitles",
    "missing_subtitles_series",
    "wanted_search_series",
];

const SYNC_TIMEOUT: Duration = Duration::from_secs(300);
const CLEANUP_TIMEOUT: Duration = Duration::from_secs(60);

fn bool_param(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

/// Bazarr client.
pub struct BazarrClient {
    client: Client,
    base_url: String,
    basic_auth: Option<(String, String)>,
}

impl BazarrClient {
    /// Create a new Bazarr client.
    pub fn new(config: &MediaServiceConfig) -> Result<Self, MediaServiceError> {
        let api_key = HeaderValue::from_str(&config.api_key).map_err(|_| {
            MediaServiceError::NotConfigured("API key contains invalid characters".to_string())
        })?;
        let mut headers = HeaderMap::new();
        headers.insert("X-API-KEY", api_key);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .default_headers(headers)
            .build()?;

        let basic_auth = config
            .username
            .as_ref()
            .filter(|u| !u.is_empty())
            .map(|u| (u.clone(), config.password.clone().unwrap_or_default()));

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            basic_auth,
        })
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        let builder = self.client.request(method, url);
        match &self.basic_auth {
            Some((user, pass)) => builder.basic_auth(user, Some(pass)),
            None => builder,
        }
    }

    async fn check(response: Response) -> Result<Response, MediaServiceError> {
        let status = response.status();
        if status == 401 || status == 403 {
            return Err(MediaServiceError::Unauthorized);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(MediaServiceError::ApiError {
                status: status.as_u16(),
                message: body,
            });
        }
        Ok(response)
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value, MediaServiceError> {
        let response = self.request(Method::GET, path).query(query).send().await?;
        let response = Self::check(response).await?;
        response.json().await.map_err(|e| {
            MediaServiceError::ParseError(format!("Failed to parse {} response: {}", path, e))
        })
    }

    async fn series_year(&self, series_id: i64) -> Option<i32> {
        let body = match self
            .get_json("/api/series", &[("seriesid[]", series_id.to_string())])
            .await
        {
            Ok(body) => body,
            Err(e) => {
                warn!(series_id, error = %e, "Could not fetch series info");
                return None;
            }
        };
        parse_series_year(&body, series_id)
    }

    async fn settings(&self) -> Result<Value, MediaServiceError> {
        self.get_json("/api/system/settings", &[]).await
    }

    fn media_ids(media: &MediaRequest) -> (i64, Vec<(&'static str, String)>) {
        match &media.kind {
            MediaKind::Movie { movie_id } => (*movie_id, vec![("radarrid[]", movie_id.to_string())]),
            MediaKind::Episode {
                series_id,
                episode_id,
                ..
            } => (
                *episode_id,
                vec![
                    ("seriesid[]", series_id.to_string()),
                    ("episodeid[]", episode_id.to_string()),
                ],
            ),
        }
    }

    fn subtitle_action_params(
        action: &str,
        path: &str,
        media: &MediaRequest,
        language: &LanguageRequest,
    ) -> Vec<(&'static str, String)> {
        let (id, _) = Self::media_ids(media);
        vec![
            ("action", action.to_string()),
            ("language", language.code.clone()),
            ("path", path.to_string()),
            ("type", media.media_type().as_str().to_string()),
            ("id", id.to_string()),
            ("forced", bool_param(language.forced).to_string()),
            ("hi", bool_param(language.hearing_impaired).to_string()),
        ]
    }
}

#[async_trait]
impl MediaService for BazarrClient {
    fn name(&self) -> &str {
        "bazarr"
    }

    async fn list_missing_subtitles(
        &self,
        media_type: MediaType,
    ) -> Result<Vec<MediaRequest>, MediaServiceError> {
        let paging = [("start", "0".to_string()), ("length", "-1".to_string())];

        match media_type {
            MediaType::Movie => {
                let body = self.get_json("/api/movies/wanted", &paging).await?;
                let items = json::list(&body, &["data"]);
                let movies: Vec<MediaRequest> = items.iter().filter_map(parse_wanted_movie).collect();
                if movies.len() < items.len() {
                    warn!(skipped = items.len() - movies.len(), "Skipped malformed wanted movies");
                }
                info!(count = movies.len(), "Fetched wanted movies");
                Ok(movies)
            }
            MediaType::Episode => {
                let body = self.get_json("/api/episodes/wanted", &paging).await?;
                let items = json::list(&body, &["data"]);
                let mut episodes: Vec<MediaRequest> =
                    items.iter().filter_map(parse_wanted_episode).collect();
                if episodes.len() < items.len() {
                    warn!(skipped = items.len() - episodes.len(), "Skipped malformed wanted episodes");
                }

                let mut years: HashMap<i64, Option<i32>> = HashMap::new();
                for episode in &mut episodes {
                    if let MediaKind::Episode { series_id, .. } = episode.kind {
                        if !years.contains_key(&series_id) {
                            let year = self.series_year(series_id).await;
                            years.insert(series_id, year);
                        }
                        episode.year = years.get(&series_id).copied().flatten();
                    }
                }

                info!(count = episodes.len(), "Fetched wanted episodes");
                Ok(episodes)
            }
        }
    }

    async fn research_interval(&self, media_type: MediaType) -> Result<Duration, MediaServiceError> {
        let markers: &[&str] = match media_type {
            MediaType::Movie => &MOVIE_TASK_MARKERS,
            MediaType::Episode => &SERIES_TASK_MARKERS,
        };

        let tasks = self.get_json("/api/system/tasks", &[]).await?;
        match find_task_interval(&tasks, markers) {
            Some(Ok(interval)) => {
                info!(media_type = %media_type, interval = %interval, "Found search task cadence");
                Ok(parse_cadence(&interval)?)
            }
            Some(Err(task)) => Err(MediaServiceError::NotFound(format!(
                "no interval on task '{}'",
                task
            ))),
            None if media_type == MediaType::Episode => {
                let settings = self.settings().await?;
                settings_episode_interval(&settings).ok_or_else(|| {
                    MediaServiceError::NotFound("episode search task".to_string())
                })
            }
            None => Err(MediaServiceError::NotFound(format!(
                "{} search task",
                media_type
            ))),
        }
    }

    async fn upload_subtitle(
        &self,
        media: &MediaRequest,
        path: &Path,
        language: &LanguageRequest,
    ) -> Result<(), MediaServiceError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "subtitle.srt".to_string());
        let part = Part::bytes(bytes).file_name(file_name).mime_str("text/plain")?;

        let forced = bool_param(language.forced);
        let hi = bool_param(language.hearing_impaired);

        let request = match &media.kind {
            MediaKind::Movie { movie_id } => {
                let form = Form::new()
                    .text("radarrid", movie_id.to_string())
                    .text("language", language.code.clone())
                    .text("forced", forced)
                    .text("hi", hi)
                    .part("file", part);
                self.request(Method::POST, "/api/movies/subtitles")
                    .multipart(form)
            }
            MediaKind::Episode {
                series_id,
                episode_id,
                ..
            } => {
                let form = Form::new().part("file", part);
                self.request(Method::POST, "/api/episodes/subtitles")
                    .query(&[
                        ("seriesid", series_id.to_string()),
                        ("episodeid", episode_id.to_string()),
                        ("language", language.code.clone()),
                        ("forced", forced.to_string()),
                        ("hi", hi.to_string()),
                    ])
                    .multipart(form)
            }
        };

        let response = request.send().await?;
        Self::check(response).await?;
        info!(media = %media.display_name(), language = %language.code, "Uploaded subtitle");
        Ok(())
    }

    async fn lookup_year(&self, title: &str) -> Result<Option<i32>, MediaServiceError> {
        let body = self
            .get_json("/api/system/searches", &[("query", title.to_string())])
            .await?;
        let year = pick_search_year(json::list(&body, &["movies"]), title);
        debug!(title = %title, year = ?year, "Year lookup");
        Ok(year)
    }

    async fn post_process_settings(&self) -> Result<PostProcessSettings, MediaServiceError> {
        let settings = self.settings().await?;
        Ok(parse_post_process_settings(&settings))
    }

    async fn stored_subtitle_path(
        &self,
        media: &MediaRequest,
        language: &LanguageRequest,
    ) -> Result<Option<String>, MediaServiceError> {
        let (_, query) = Self::media_ids(media);
        let path = match media.media_type() {
            MediaType::Movie => "/api/movies",
            MediaType::Episode => "/api/episodes",
        };
        let body = self.get_json(path, &query).await?;
        let Some(item) = json::list(&body, &["data"]).first() else {
            return Ok(None);
        };
        Ok(find_subtitle_path(item, language))
    }

    async fn trigger_sync(
        &self,
        path: &str,
        media: &MediaRequest,
        language: &LanguageRequest,
        options: &SyncOptions,
    ) -> Result<(), MediaServiceError> {
        let mut params = Self::subtitle_action_params("sync", path, media, language);
        params.extend([
            ("reference", options.reference.clone()),
            ("max_offset_seconds", options.max_offset_seconds.to_string()),
            ("no_fix_framerate", bool_param(options.no_fix_framerate).to_string()),
            ("gss", bool_param(options.use_gss).to_string()),
        ]);

        let response = self
            .request(Method::PATCH, "/api/subtitles")
            .query(&params)
            .timeout(SYNC_TIMEOUT)
            .send()
            .await?;
        Self::check(response).await?;
        info!(media = %media.display_name(), language = %language.code, "Synchronized subtitle");
        Ok(())
    }

    async fn trigger_text_cleanup(
        &self,
        path: &str,
        media: &MediaRequest,
        language: &LanguageRequest,
    ) -> Result<(), MediaServiceError> {
        let params = Self::subtitle_action_params("subzero", path, media, language);

        let response = self
            .request(Method::PATCH, "/api/subtitles")
            .query(&params)
            .timeout(CLEANUP_TIMEOUT)
            .send()
            .await?;
        Self::check(response).await?;
        info!(media = %media.display_name(), language = %language.code, "Applied text cleanup");
        Ok(())
    }
}

fn parse_languages(item: &Value) -> Vec<LanguageRequest> {
    item.get("missing_subtitles")
        .and_then(Value::as_array)
        .map(|langs| {
            langs
                .iter()
                .filter_map(|lang| {
                    Some(LanguageRequest {
                        name: json::text(lang.get("name"))?,
                        code: json::text(lang.get("code2"))?,
                        forced: json::flag(lang.get("forced")),
                        hearing_impaired: json::flag(lang.get("hi")),
                    })
                })
                .collect()
        })
        .unwrap_or_default()
}

/// One wanted-movie record, or `None` if it lacks a title or id.
pub(crate) fn parse_wanted_movie(item: &Value) -> Option<MediaRequest> {
    let title = json::text(item.get("title"))?;
    let movie_id = json::int(item.get("radarrId")).or_else(|| json::int(item.get("radarrid")))?;
    let year = json::int(item.get("year"))
        .and_then(|y| i32::try_from(y).ok())
        .filter(|y| *y > 0);

    Some(MediaRequest {
        title,
        year,
        kind: MediaKind::Movie { movie_id },
        languages: parse_languages(item),
    })
}

/// One wanted-episode record. `episode_number` arrives as `"SxE"`.
pub(crate) fn parse_wanted_episode(item: &Value) -> Option<MediaRequest> {
    let title = json::text(item.get("seriesTitle"))?;
    let numbering = json::text(item.get("episode_number"))?;
    let (season, episode) = numbering.split_once('x')?;
    let season: u32 = season.trim().parse().ok()?;
    let episode: u32 = episode.trim().parse().ok()?;

    Some(MediaRequest {
        title,
        year: None,
        kind: MediaKind::Episode {
            series_id: json::int(item.get("sonarrSeriesId"))?,
            episode_id: json::int(item.get("sonarrEpisodeId"))?,
            season,
            episode,
            episode_title: json::text(item.get("episodeTitle")),
        },
        languages: parse_languages(item),
    })
}

fn parse_series_year(body: &Value, series_id: i64) -> Option<i32> {
    json::list(body, &["data"])
        .iter()
        .find(|s| {
            json::int(s.get("sonarrSeriesId")) == Some(series_id)
                || json::int(s.get("seriesId")) == Some(series_id)
        })
        .and_then(|s| json::int(s.get("year")))
        .and_then(|y| i32::try_from(y).ok())
        .filter(|y| *y > 0)
}

/// Locate the search task and its raw interval.
///
/// `Some(Err(name))` means the task exists but carries no interval.
fn find_task_interval(tasks: &Value, markers: &[&str]) -> Option<Result<String, String>> {
    let list: Vec<&Value> = match tasks {
        Value::Array(items) => items.iter().collect(),
        Value::Object(map) => match json::list(tasks, &["data", "tasks"]) {
            [] if !map.contains_key("data") && !map.contains_key("tasks") => map.values().collect(),
            items => items.iter().collect(),
        },
        _ => Vec::new(),
    };

    let task = list.into_iter().filter(|t| t.is_object()).find(|task| {
        let name = json::text(task.get("name")).unwrap_or_default().to_lowercase();
        let job_id = json::text(task.get("job_id")).unwrap_or_default().to_lowercase();
        markers
            .iter()
            .any(|m| name.contains(m) || job_id.contains(m))
    })?;

    let name = json::text(task.get("name")).unwrap_or_default();
    Some(json::text(task.get("interval")).ok_or(name))
}

fn settings_episode_interval(settings: &Value) -> Option<Duration> {
    let hours = json::int(settings.get("general")?.get("episode_search_interval"))?;
    let secs = u64::try_from(hours.max(1)).ok()?.checked_mul(3600)?;
    Some(Duration::from_secs(secs))
}

/// Year of the best search result for `title`: the first result whose title
/// contains or is contained in the query, else the first result.
fn pick_search_year(results: &[Value], title: &str) -> Option<i32> {
    let query = normalize_subject_key(title);
    let year_of = |item: &Value| {
        json::int(item.get("year"))
            .and_then(|y| i32::try_from(y).ok())
            .filter(|y| *y > 0)
    };

    results
        .iter()
        .find_map(|item| {
            let candidate = normalize_subject_key(&json::text(item.get("title")).unwrap_or_default());
            let related = !candidate.is_empty()
                && (candidate.contains(&query) || query.contains(&candidate));
            if related {
                year_of(item)
            } else {
                None
            }
        })
        .or_else(|| results.first().and_then(year_of))
}

fn parse_post_process_settings(settings: &Value) -> PostProcessSettings {
    let defaults = SyncOptions::default();
    let sync = match settings.get("subsync") {
        Some(subsync) => SyncOptions {
            enabled: json::flag(subsync.get("use_subsync")),
            max_offset_seconds: json::int(subsync.get("max_offset_seconds"))
                .and_then(|v| u32::try_from(v).ok())
                .unwrap_or(defaults.max_offset_seconds),
            no_fix_framerate: json::flag(subsync.get("no_fix_framerate")),
            use_gss: json::flag(subsync.get("gss")),
            reference: defaults.reference.clone(),
        },
        None => defaults,
    };

    let mods = settings
        .get("general")
        .and_then(|g| g.get("subzero_mods"))
        .and_then(Value::as_array)
        .map(|mods| mods.iter().filter_map(|m| json::text(Some(m))).collect())
        .unwrap_or_default();

    PostProcessSettings {
        sync,
        text_cleanup: TextCleanupSettings { mods },
    }
}

fn find_subtitle_path(item: &Value, language: &LanguageRequest) -> Option<String> {
    item.get("subtitles")?
        .as_array()?
        .iter()
        .filter(|s| {
            json::text(s.get("code2")).is_some_and(|c| c.eq_ignore_ascii_case(&language.code))
        })
        .find_map(|s| json::text(s.get("path")))
}
