#![doc(html_root_url = "https://docs.rs/vnode-patch/0.0.3")]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! A retained virtual tree reconciler.
//!
//! A [`Renderer`] keeps host containers in sync with trees of [`VNode`] records.
//! Each render produces a fresh tree, and the renderer patches the host tree from the previous one
//! with as few [`HostOps`] calls as the compiler hints on the new tree allow.
//!
//! Hints come in two forms:
//!
//! - [`PatchFlags`] on individual nodes say which parts of them may differ between renders.
//! - Blocks (see [`RenderContext::block`]) collect their dynamic descendants, so updates can skip the static structure around them.
//!
//! Component re-renders are batched through a job queue and run by [`Renderer::flush`].

mod block;
mod children;
mod component;
mod error;
mod flags;
mod host;
mod key_maps;
mod lis;
mod patch;
mod renderer;
mod scheduler;
mod template_cache;
mod unmount;
mod vnode;

pub use block::RenderContext;
pub use component::{BoxError, ComponentDef, ComponentInstance, Hook, InstanceId, LifecycleHook, LifecycleState, RenderFn};
pub use error::{RenderError, Warning};
pub use flags::{PatchFlags, StaticHint};
pub use host::{HostOps, HostRef};
pub use renderer::{Renderer, RendererOptions};
pub use scheduler::{HookContext, Job};
pub use vnode::{Children, Key, NodeKind, NodeType, PropValue, Props, VNode, VNodeBuilder, VNodeId};
