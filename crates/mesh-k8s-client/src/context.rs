// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Request scopes carrying cancellation and deadlines.

use std::future::Future;
use std::pin::Pin;
use std::task::{Context as TaskContext, Poll};
use std::time::Duration;

use futures::Stream;
use pin_project_lite::pin_project;
use tokio::time::{Instant, Sleep};
use tokio_util::sync::{CancellationToken, WaitForCancellationFutureOwned};

use crate::error::{CancelReason, ClientError, ClientResult};

/// Cancellable scope for a client call.
///
/// Cancelling a context cancels every context derived from it. Dropping a
/// context does not cancel it.
#[derive(Clone, Debug)]
pub struct Context {
	token: CancellationToken,
	deadline: Option<Instant>,
}

impl Context {
	/// A scope that is never cancelled and has no deadline.
	pub fn background() -> Self {
		Self {
			token: CancellationToken::new(),
			deadline: None,
		}
	}

	/// A child scope that can be cancelled on its own.
	pub fn child(&self) -> Self {
		Self {
			token: self.token.child_token(),
			deadline: self.deadline,
		}
	}

	/// A child scope that expires after `timeout`, or earlier if the parent does.
	pub fn with_timeout(&self, timeout: Duration) -> Self {
		self.with_deadline(Instant::now() + timeout)
	}

	pub fn with_deadline(&self, deadline: Instant) -> Self {
		let deadline = match self.deadline {
			Some(existing) if existing < deadline => existing,
			_ => deadline,
		};
		Self {
			token: self.token.child_token(),
			deadline: Some(deadline),
		}
	}

	pub fn cancel(&self) {
		self.token.cancel();
	}

	pub fn is_cancelled(&self) -> bool {
		self.token.is_cancelled()
	}

	pub fn deadline(&self) -> Option<Instant> {
		self.deadline
	}

	/// Why this scope is no longer usable, if it is not.
	pub fn err(&self) -> Option<CancelReason> {
		if self.token.is_cancelled() {
			Some(CancelReason::Cancelled)
		} else if self.deadline.is_some_and(|d| d <= Instant::now()) {
			Some(CancelReason::DeadlineExceeded)
		} else {
			None
		}
	}

	/// Drives `fut` to completion unless the scope ends first.
	///
	/// `fallback_timeout` bounds the call when the scope has no deadline.
	pub(crate) async fn run<T, F>(&self, fallback_timeout: Option<Duration>, fut: F) -> ClientResult<T>
	where
		F: Future<Output = ClientResult<T>>,
	{
		if let Some(reason) = self.err() {
			return Err(ClientError::Cancelled(reason));
		}

		let deadline = self
			.deadline
			.or_else(|| fallback_timeout.map(|t| Instant::now() + t));

		let expired = async {
			match deadline {
				Some(at) => tokio::time::sleep_until(at).await,
				None => std::future::pending().await,
			}
		};

		tokio::select! {
			biased;
			_ = self.token.cancelled() => Err(ClientError::Cancelled(CancelReason::Cancelled)),
			_ = expired => Err(ClientError::Cancelled(CancelReason::DeadlineExceeded)),
			res = fut => res,
		}
	}

	/// Ties a stream to this scope: once the scope ends the stream yields a
	/// single `Cancelled` error and then terminates, dropping `inner`.
	pub(crate) fn guard<S>(&self, inner: S) -> Guarded<S> {
		Guarded {
			inner: Some(inner),
			cancelled: self.token.clone().cancelled_owned(),
			deadline: self.deadline.map(|at| Box::pin(tokio::time::sleep_until(at))),
		}
	}
}

impl Default for Context {
	fn default() -> Self {
		Self::background()
	}
}

pin_project! {
	/// A stream that ends when its request scope ends.
	pub struct Guarded<S> {
		inner: Option<S>,
		#[pin]
		cancelled: WaitForCancellationFutureOwned,
		deadline: Option<Pin<Box<Sleep>>>,
	}
}

impl<S, T> Stream for Guarded<S>
where
	S: Stream<Item = ClientResult<T>> + Unpin,
{
	type Item = ClientResult<T>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut TaskContext<'_>) -> Poll<Option<Self::Item>> {
		let this = self.project();
		if this.inner.is_none() {
			return Poll::Ready(None);
		}

		let reason = if this.cancelled.poll(cx).is_ready() {
			Some(CancelReason::Cancelled)
		} else if let Some(deadline) = this.deadline.as_mut() {
			deadline
				.as_mut()
				.poll(cx)
				.is_ready()
				.then_some(CancelReason::DeadlineExceeded)
		} else {
			None
		};

		if let Some(reason) = reason {
			*this.inner = None;
			return Poll::Ready(Some(Err(ClientError::Cancelled(reason))));
		}

		let Some(inner) = this.inner.as_mut() else {
			return Poll::Ready(None);
		};
		match Pin::new(inner).poll_next(cx) {
			Poll::Ready(None) => {
				*this.inner = None;
				Poll::Ready(None)
			}
			other => other,
		}
	}
}
