use frontcache_policy::{BackendHealth, Request, Response, evaluate_fetch, evaluate_recv};

use crate::cli::{OutputFormat, PolicyFetchArgs, PolicyRecvArgs};
use crate::client::CliResult;
use crate::output::{emit, fetch_table, recv_table};

pub(crate) fn handle_policy_recv(args: &PolicyRecvArgs, format: OutputFormat) -> CliResult<()> {
    let health = if args.sick {
        BackendHealth::Sick
    } else {
        BackendHealth::Healthy
    };
    let outcome = evaluate_recv(recv_request(args), health);
    emit(&outcome, &recv_table(&outcome), format)
}

pub(crate) fn handle_policy_fetch(args: &PolicyFetchArgs, format: OutputFormat) -> CliResult<()> {
    let response = args
        .headers
        .iter()
        .fold(Response::new(args.status), |response, (name, value)| {
            response.header(name, value.as_str())
        });
    let outcome = evaluate_fetch(response);
    emit(&outcome, &fetch_table(&outcome), format)
}

fn recv_request(args: &PolicyRecvArgs) -> Request {
    args.headers
        .iter()
        .fold(
            Request::new(args.method.to_ascii_uppercase(), args.url.as_str()),
            |request, (name, value)| request.header(name, value.as_str()),
        )
        .client_ip(args.client_ip)
        .restarts(args.restarts)
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use frontcache_policy::RecvAction;

    use super::*;

    fn recv_args(url: &str, headers: &[(&str, &str)]) -> PolicyRecvArgs {
        PolicyRecvArgs {
            method: "get".to_string(),
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(name, value)| ((*name).to_string(), (*value).to_string()))
                .collect(),
            client_ip: IpAddr::V4(Ipv4Addr::new(10, 0, 0, 9)),
            restarts: 0,
            sick: false,
        }
    }

    #[test]
    fn static_asset_cookies_are_stripped() {
        let args = recv_args(
            "/script.js",
            &[
                ("Host", "example.com"),
                ("X-Forwarded-Proto", "https"),
                ("Cookie", "_session_id=abc"),
            ],
        );
        let outcome = evaluate_recv(recv_request(&args), BackendHealth::Healthy);
        assert_eq!(outcome.action, RecvAction::Lookup);
        assert!(outcome.request.headers.get("Cookie").is_none());
        assert_eq!(outcome.request.method, "GET");
    }

    #[test]
    fn handlers_render_both_formats() {
        let args = recv_args("/", &[("X-Forwarded-Proto", "https")]);
        assert!(handle_policy_recv(&args, OutputFormat::Table).is_ok());
        assert!(handle_policy_recv(&args, OutputFormat::Json).is_ok());

        let fetch = PolicyFetchArgs {
            status: 200,
            headers: vec![
                ("Cache-Control".to_string(), "no-cache".to_string()),
                ("Set-Cookie".to_string(), "a=1".to_string()),
            ],
        };
        assert!(handle_policy_fetch(&fetch, OutputFormat::Json).is_ok());
    }
}
