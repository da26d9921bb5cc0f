//! Error text for HTTP statuses that did not fail at the transport level

/// `(description, localized_description)` for a status the inspector flags as
/// an error. 2xx and unlisted codes map to nothing.
pub fn status_error(status: u16) -> Option<(&'static str, &'static str)> {
    let text = match status {
        100 => (
            "continue",
            "The server has received the request headers; the client should send the body.",
        ),
        101 => ("switching protocols", "The server is switching protocols as requested."),
        102 => ("processing", "The server has accepted the request but has not completed it yet."),
        103 => ("checkpoint", "Used to resume aborted PUT or POST requests."),
        122 => ("URI too long", "The request URI exceeds the client's length limit."),
        300 => ("multiple choices", "The resource has multiple representations to choose from."),
        301 => ("moved permanently", "This and all future requests should go to the given URI."),
        302 => ("found", "The resource was found at a different URI."),
        303 => ("see other", "The response can be found at another URI using GET."),
        304 => ("not modified", "The resource has not changed since the last request."),
        305 => ("use proxy", "The resource must be accessed through the given proxy."),
        306 => ("switch proxy", "Subsequent requests should use the given proxy."),
        307 => ("temporary redirect", "Repeat the request at another URI with the same method."),
        308 => ("permanent redirect", "This and all future requests should go to another URI."),
        400 => ("bad request", "The server cannot process the request due to a client error."),
        401 => ("unauthorized", "Authentication is required and has failed or not been provided."),
        402 => ("payment required", "Payment is required to access the resource."),
        403 => ("forbidden", "The server refuses to authorize the request."),
        404 => ("not found", "The requested resource could not be found."),
        405 => ("method not allowed", "The request method is not supported by the resource."),
        406 => ("not acceptable", "No content matches the request's Accept headers."),
        407 => ("proxy authentication required", "The client must authenticate with the proxy."),
        408 => ("request timeout", "The server timed out waiting for the request."),
        409 => ("conflict", "The request conflicts with the current state of the resource."),
        410 => ("gone", "The resource is no longer available and will not be again."),
        411 => ("length required", "The request did not specify a required content length."),
        412 => ("precondition failed", "A precondition in the request headers was not met."),
        413 => ("request entity too large", "The request is larger than the server will process."),
        414 => ("request URI too long", "The URI is longer than the server will interpret."),
        415 => ("unsupported media type", "The request entity has an unsupported media type."),
        416 => ("requested range not satisfiable", "The requested range cannot be supplied."),
        417 => ("expectation failed", "The server cannot meet the Expect request header."),
        418 => ("I'm a teapot", "The server refuses to brew coffee because it is a teapot."),
        420 => ("rate limited", "The client is being rate limited."),
        421 => ("misdirected request", "The request went to a server that cannot respond."),
        422 => ("unprocessable entity", "The request was well-formed but has semantic errors."),
        423 => ("locked", "The resource being accessed is locked."),
        424 => ("failed dependency", "The request failed because a previous request failed."),
        426 => ("upgrade required", "The client should switch to a different protocol."),
        428 => ("precondition required", "The server requires the request to be conditional."),
        429 => ("too many requests", "The client has sent too many requests in a given time."),
        431 => ("request header fields too large", "The request headers are too large."),
        444 => ("no response", "The server closed the connection without a response."),
        449 => ("retry with", "The request should be retried after performing an action."),
        450 => ("blocked by parental controls", "Access was blocked by parental controls."),
        451 => ("wrong exchange server", "The server cannot reach the client's mailbox."),
        499 => ("client closed request", "The client closed the connection before a response."),
        500 => ("internal server error", "The server encountered an unexpected condition."),
        501 => ("not implemented", "The server does not support the requested functionality."),
        502 => ("bad gateway", "The upstream server returned an invalid response."),
        503 => ("service unavailable", "The server is currently unavailable."),
        504 => ("gateway timeout", "The upstream server did not respond in time."),
        505 => ("HTTP version not supported", "The HTTP version is not supported by the server."),
        506 => ("variant also negotiates", "Content negotiation resulted in a circular reference."),
        507 => ("insufficient storage", "The server is unable to store the representation."),
        508 => ("loop detected", "The server detected an infinite loop processing the request."),
        509 => ("bandwidth limit exceeded", "The server has exceeded its bandwidth limit."),
        510 => ("not extended", "Further extensions to the request are required."),
        511 => (
            "network authentication required",
            "The client must authenticate for network access.",
        ),
        526 => (
            "invalid SSL certificate",
            "The origin server's SSL certificate could not be validated.",
        ),
        598 => ("network read timeout", "A network read timed out behind the proxy."),
        599 => ("network connect timeout", "A network connection timed out behind the proxy."),
        _ => return None,
    };
    Some(text)
}
