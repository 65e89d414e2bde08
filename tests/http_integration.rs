// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integration tests for the HTTP transport using wiremock.

use std::time::Duration;

use tokio::time::timeout;
use wiremock::matchers::{body_string, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};
use wot_lamp::protocol::HttpTransport;
use wot_lamp::{
    ConnectionStatus, Error, HttpConfig, ObserverConfig, PowerState, PropertyObserver, Transport,
    TransportError,
};

const PROPERTY_PATH: &str = "/lamp/properties/powerState";
const OBSERVE_PATH: &str = "/lamp/properties/powerState/observable";

fn transport_for(server: &MockServer) -> HttpTransport {
    HttpTransport::new(&HttpConfig::new(server.uri()), "lamp").unwrap()
}

fn observer_for(server: &MockServer) -> PropertyObserver<HttpTransport> {
    PropertyObserver::new(transport_for(server)).with_backoff(Duration::from_millis(200))
}

/// Mounts an observable response that is held far longer than any test.
async fn mount_held_poll(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(OBSERVE_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_string("off")
                .set_delay(Duration::from_secs(60)),
        )
        .mount(server)
        .await;
}

// ============================================================================
// Transport Tests
// ============================================================================

mod transport {
    use super::*;
    use wot_lamp::RawPayload;

    #[tokio::test]
    async fn read_bare_token() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(PROPERTY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("on"))
            .mount(&mock_server)
            .await;

        let raw = transport_for(&mock_server).read().await.unwrap();
        assert_eq!(raw, RawPayload::text("on"));
    }

    #[tokio::test]
    async fn read_json_envelope() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(PROPERTY_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "powerState": "off" })),
            )
            .mount(&mock_server)
            .await;

        let raw = transport_for(&mock_server).read().await.unwrap();
        assert_eq!(
            raw,
            RawPayload::Json(serde_json::json!({ "powerState": "off" }))
        );
    }

    #[tokio::test]
    async fn read_error_status() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(PROPERTY_PATH))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let err = transport_for(&mock_server).read().await.unwrap_err();
        assert!(matches!(err, TransportError::Status { code: 404, .. }));
    }

    #[tokio::test]
    async fn read_times_out() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(PROPERTY_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("on")
                    .set_delay(Duration::from_secs(5)),
            )
            .mount(&mock_server)
            .await;

        let config = HttpConfig::new(mock_server.uri()).with_timeout(Duration::from_millis(100));
        let transport = HttpTransport::new(&config, "lamp").unwrap();

        let err = transport.read().await.unwrap_err();
        assert!(matches!(err, TransportError::Timeout(100)));
    }

    #[tokio::test]
    async fn observe_uses_observable_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(OBSERVE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"off\""))
            .expect(1)
            .mount(&mock_server)
            .await;

        let raw = transport_for(&mock_server).observe().await.unwrap();
        assert_eq!(raw, RawPayload::text("\"off\""));
    }

    #[tokio::test]
    async fn write_sends_json_string() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(PROPERTY_PATH))
            .and(header("content-type", "application/json"))
            .and(body_string("\"on\""))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&mock_server)
            .await;

        transport_for(&mock_server)
            .write(PowerState::On)
            .await
            .unwrap();
    }
}

// ============================================================================
// Observer Tests
// ============================================================================

mod observer {
    use super::*;

    #[tokio::test]
    async fn read_initial_json_string_body() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(PROPERTY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("\"on\""))
            .mount(&mock_server)
            .await;

        let observer = observer_for(&mock_server);
        assert_eq!(observer.read_initial().await.unwrap(), PowerState::On);
        assert!(observer.is_on());
    }

    #[tokio::test]
    async fn read_initial_server_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(PROPERTY_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let observer = observer_for(&mock_server);
        let err = observer.read_initial().await.unwrap_err();
        assert!(matches!(
            err,
            Error::Read(TransportError::Status { code: 500, .. })
        ));
        assert_eq!(observer.power(), PowerState::Unknown);
    }

    #[tokio::test]
    async fn write_rejected() {
        let mock_server = MockServer::start().await;

        Mock::given(method("PUT"))
            .and(path(PROPERTY_PATH))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let observer = observer_for(&mock_server);
        let err = observer.request_write(PowerState::Off).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Write(TransportError::Status { code: 500, .. })
        ));
        assert_eq!(observer.power(), PowerState::Unknown);
    }

    #[tokio::test]
    async fn from_config_uses_http_transport() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/desk/properties/powerState"))
            .respond_with(ResponseTemplate::new(200).set_body_string("OFF"))
            .mount(&mock_server)
            .await;

        let config = ObserverConfig::http(mock_server.uri()).with_thing("desk");
        let observer = PropertyObserver::from_config(config).await.unwrap();

        assert_eq!(observer.read_initial().await.unwrap(), PowerState::Off);
    }

    #[tokio::test]
    async fn observes_changes_and_recovers_from_errors() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(PROPERTY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("on"))
            .mount(&mock_server)
            .await;

        // Observable replies, consumed in priority order.
        Mock::given(method("GET"))
            .and(path(OBSERVE_PATH))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "powerState": "off" })),
            )
            .up_to_n_times(1)
            .with_priority(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(OBSERVE_PATH))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .with_priority(2)
            .mount(&mock_server)
            .await;
        Mock::given(method("GET"))
            .and(path(OBSERVE_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("on"))
            .up_to_n_times(1)
            .with_priority(3)
            .mount(&mock_server)
            .await;
        mount_held_poll(&mock_server).await;

        let observer = observer_for(&mock_server);
        let mut rx = observer.subscribe();
        observer.connect();

        let wait = Duration::from_secs(5);

        timeout(wait, rx.wait_for(|s| s.power() == PowerState::Off))
            .await
            .unwrap()
            .unwrap();

        let state = timeout(wait, rx.wait_for(|s| s.status() == ConnectionStatus::Error))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert_eq!(state.power(), PowerState::Off);
        assert!(state.last_error().unwrap().contains("503"));

        let state = timeout(wait, rx.wait_for(|s| s.is_on() && s.is_connected()))
            .await
            .unwrap()
            .unwrap()
            .clone();
        assert!(state.last_error().is_none());

        observer.disconnect();
    }

    #[tokio::test]
    async fn disconnect_abandons_held_poll() {
        let mock_server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path(PROPERTY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_string("on"))
            .mount(&mock_server)
            .await;
        mount_held_poll(&mock_server).await;

        let observer = observer_for(&mock_server);
        let mut rx = observer.subscribe();
        observer.connect();

        timeout(Duration::from_secs(5), rx.wait_for(|s| s.is_connected()))
            .await
            .unwrap()
            .unwrap();

        observer.disconnect();
        assert!(!observer.is_running());

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert!(observer.is_on());
        assert_eq!(observer.status(), ConnectionStatus::Connected);
    }
}
