//! Background I/O task of an interactive remote process.

use std::future::Future;
use std::sync::Arc;

use log::{debug, trace};
use russh::client::Msg;
use russh::{Channel, ChannelMsg, Sig};

use super::ProcessExit;
use crate::channel::{CommandStream, OutputBuffer};
use crate::error::{ChannelError, Result};

/// The channel operations [`pump`] needs.
pub(crate) trait InteractiveChannel: Send + 'static {
    /// Next message from the remote side; `None` once the channel closed.
    fn recv(&mut self) -> impl Future<Output = Option<ChannelMsg>> + Send;

    /// Send bytes to the process's stdin.
    fn send(&mut self, data: &[u8]) -> impl Future<Output = Result<()>> + Send;

    /// Signal end of input.
    fn eof(&mut self) -> impl Future<Output = Result<()>> + Send;
}

impl InteractiveChannel for Channel<Msg> {
    async fn recv(&mut self) -> Option<ChannelMsg> {
        Channel::wait(self).await
    }

    async fn send(&mut self, data: &[u8]) -> Result<()> {
        Channel::data(self, data).await.map_err(channel_error)?;
        Ok(())
    }

    async fn eof(&mut self) -> Result<()> {
        Channel::eof(self).await.map_err(channel_error)?;
        Ok(())
    }
}

/// Map a russh error on an open channel, singling out a channel that is gone.
pub(crate) fn channel_error(error: russh::Error) -> ChannelError {
    match error {
        russh::Error::SendError | russh::Error::WrongChannel => ChannelError::Closed,
        other => ChannelError::Ssh(other),
    }
}

fn signal_name(signal: &Sig) -> String {
    match signal {
        Sig::Custom(name) => name.clone(),
        other => format!("{:?}", other),
    }
}

enum PumpEvent {
    Remote(Option<ChannelMsg>),
    Input,
}

/// Shuttle bytes between the command stream, the channel and the buffer
/// until the remote side closes the channel.
///
/// Once the interrupt has been forwarded, EOF is sent and input is no longer
/// polled; output keeps draining until the channel closes.
pub(crate) async fn pump<C: InteractiveChannel>(
    mut channel: C,
    input: Arc<CommandStream>,
    output: OutputBuffer,
) -> Result<ProcessExit> {
    let mut exit = ProcessExit::default();
    let mut input_open = true;

    loop {
        let event = tokio::select! {
            msg = channel.recv() => PumpEvent::Remote(msg),
            _ = input.readable(), if input_open => PumpEvent::Input,
        };

        match event {
            PumpEvent::Remote(Some(msg)) => match msg {
                ChannelMsg::Data { data } => output.extend(&data),
                ChannelMsg::ExtendedData { data, .. } => output.extend(&data),
                ChannelMsg::ExitStatus { exit_status } => exit.code = Some(exit_status),
                ChannelMsg::ExitSignal { signal_name: sig, .. } => {
                    exit.signal = Some(signal_name(&sig))
                }
                _ => {}
            },
            PumpEvent::Remote(None) => break,
            PumpEvent::Input => {
                let pending = input.read(None);
                if !pending.is_empty() {
                    trace!("forwarding {} bytes of input", pending.len());
                    channel.send(pending.as_bytes()).await?;
                }
                if input.is_finished() {
                    // Ctrl-C is on its way; the process may still print.
                    if let Err(e) = channel.eof().await {
                        debug!("eof after interrupt failed: {}", e);
                    }
                    input_open = false;
                }
            }
        }
    }

    debug!("interactive process ended: {:?}", exit);
    Ok(exit)
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::time::Duration;

    use russh::CryptoVec;
    use tokio::sync::mpsc;

    use super::*;
    use crate::channel::ETX;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Sent {
        Data(String),
        Eof,
    }

    /// Channel fed from an mpsc queue that records what the pump sends.
    struct FakeChannel {
        remote: mpsc::UnboundedReceiver<ChannelMsg>,
        sent: Arc<Mutex<Vec<Sent>>>,
        refuse_data: bool,
    }

    impl InteractiveChannel for FakeChannel {
        async fn recv(&mut self) -> Option<ChannelMsg> {
            self.remote.recv().await
        }

        async fn send(&mut self, data: &[u8]) -> Result<()> {
            if self.refuse_data {
                return Err(ChannelError::Closed.into());
            }
            self.sent
                .lock()
                .unwrap()
                .push(Sent::Data(String::from_utf8_lossy(data).into_owned()));
            Ok(())
        }

        async fn eof(&mut self) -> Result<()> {
            self.sent.lock().unwrap().push(Sent::Eof);
            Ok(())
        }
    }

    fn fake() -> (
        FakeChannel,
        mpsc::UnboundedSender<ChannelMsg>,
        Arc<Mutex<Vec<Sent>>>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        let sent = Arc::new(Mutex::new(Vec::new()));
        let channel = FakeChannel {
            remote: rx,
            sent: sent.clone(),
            refuse_data: false,
        };
        (channel, tx, sent)
    }

    fn data(text: &str) -> ChannelMsg {
        ChannelMsg::Data {
            data: CryptoVec::from_slice(text.as_bytes()),
        }
    }

    async fn wait_until_sent(sent: &Arc<Mutex<Vec<Sent>>>, event: Sent) {
        let wait = async {
            while !sent.lock().unwrap().contains(&event) {
                tokio::time::sleep(Duration::from_millis(1)).await;
            }
        };
        tokio::time::timeout(Duration::from_secs(1), wait)
            .await
            .expect("event was never sent");
    }

    #[tokio::test]
    async fn test_forwards_input_in_order() {
        let (channel, tx, sent) = fake();
        let input = Arc::new(CommandStream::new());
        let task = tokio::spawn(pump(channel, input.clone(), OutputBuffer::default()));

        input.write("register_read r0").unwrap();
        wait_until_sent(&sent, Sent::Data("register_read r0\n".to_string())).await;
        input.write("register_read r1").unwrap();
        wait_until_sent(&sent, Sent::Data("register_read r1\n".to_string())).await;

        drop(tx);
        tokio_test::assert_ok!(task.await.unwrap());
        assert_eq!(
            *sent.lock().unwrap(),
            [
                Sent::Data("register_read r0\n".to_string()),
                Sent::Data("register_read r1\n".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_eof_follows_interrupt() {
        let (channel, tx, sent) = fake();
        let input = Arc::new(CommandStream::new());
        input.write("table_dump t1").unwrap();
        input.send_terminate();

        let task = tokio::spawn(pump(channel, input.clone(), OutputBuffer::default()));
        wait_until_sent(&sent, Sent::Eof).await;
        drop(tx);
        task.await.unwrap().unwrap();

        let sent = sent.lock().unwrap().clone();
        assert_eq!(sent.last(), Some(&Sent::Eof));
        let forwarded: String = sent
            .iter()
            .filter_map(|s| match s {
                Sent::Data(d) => Some(d.as_str()),
                Sent::Eof => None,
            })
            .collect();
        assert_eq!(forwarded, format!("table_dump t1\n{}", ETX));
        assert_eq!(sent.iter().filter(|s| **s == Sent::Eof).count(), 1);
    }

    #[tokio::test]
    async fn test_output_drains_after_eof() {
        let (channel, tx, sent) = fake();
        let input = Arc::new(CommandStream::new());
        let output = OutputBuffer::default();
        input.send_terminate();

        let task = tokio::spawn(pump(channel, input, output.clone()));
        wait_until_sent(&sent, Sent::Eof).await;

        tx.send(data("Obtaining JSON from switch...\n")).unwrap();
        tx.send(ChannelMsg::ExtendedData {
            data: CryptoVec::from_slice(b"KeyboardInterrupt\n"),
            ext: 1,
        })
        .unwrap();
        tx.send(ChannelMsg::ExitStatus { exit_status: 130 }).unwrap();
        drop(tx);

        let exit = task.await.unwrap().unwrap();
        assert_eq!(
            output.snapshot(),
            "Obtaining JSON from switch...\nKeyboardInterrupt\n"
        );
        assert_eq!(exit.code, Some(130));
        assert!(!exit.is_success());
    }

    #[tokio::test]
    async fn test_exit_status_and_signal_mapping() {
        let (channel, tx, _sent) = fake();
        tx.send(ChannelMsg::ExitStatus { exit_status: 0 }).unwrap();
        drop(tx);
        let exit = pump(channel, Arc::new(CommandStream::new()), OutputBuffer::default())
            .await
            .unwrap();
        assert!(exit.is_success());

        let (channel, tx, _sent) = fake();
        tx.send(ChannelMsg::ExitSignal {
            signal_name: Sig::INT,
            core_dumped: false,
            error_message: String::new(),
            lang_tag: String::new(),
        })
        .unwrap();
        drop(tx);
        let exit = pump(channel, Arc::new(CommandStream::new()), OutputBuffer::default())
            .await
            .unwrap();
        assert_eq!(exit.code, None);
        assert_eq!(exit.signal.as_deref(), Some("INT"));
        assert!(!exit.is_success());
    }

    #[tokio::test]
    async fn test_send_failure_ends_pump() {
        let (mut channel, _tx, _sent) = fake();
        channel.refuse_data = true;
        let input = Arc::new(CommandStream::new());
        input.write("register_read r0").unwrap();

        let err = pump(channel, input, OutputBuffer::default())
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::Channel(ChannelError::Closed)));
    }

    #[test]
    fn test_channel_error_mapping() {
        assert!(matches!(
            channel_error(russh::Error::SendError),
            ChannelError::Closed
        ));
        assert!(matches!(
            channel_error(russh::Error::Inconsistent),
            ChannelError::Ssh(_)
        ));
        assert_eq!(signal_name(&Sig::Custom("WINCH".to_string())), "WINCH");
    }
}
